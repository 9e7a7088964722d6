use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::content::ProtectionRequest;
use crate::models::verification::VerificationOutcome;

/// Provenance claim recorded by the attestation ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttestationClaim {
    pub content_id: String,
    pub title: String,
    pub artist: String,
    pub publisher: String,
    pub isrc: String,
    pub upc: String,
    pub verification_score: f64,
    pub verification_timestamp: DateTime<Utc>,
    /// Content profile from the verification analysis; `{}` when absent.
    pub fingerprint: serde_json::Value,
}

impl AttestationClaim {
    pub fn new(request: &ProtectionRequest, verification: &VerificationOutcome) -> Self {
        let metadata = &request.metadata;
        Self {
            content_id: request.content_id().to_string(),
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            publisher: metadata.publisher.clone().unwrap_or_default(),
            isrc: metadata.isrc.clone().unwrap_or_default(),
            upc: metadata.upc.clone().unwrap_or_default(),
            verification_score: verification.confidence_score,
            verification_timestamp: Utc::now(),
            fingerprint: verification
                .detail
                .get("contentProfile")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({})),
        }
    }
}

/// What the ledger returns after recording an attestation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttestationReceipt {
    pub attestation_id: String,
    /// Ledger transaction reference.
    pub ledger_ref: String,
    pub claim: AttestationClaim,
}

/// Token metadata submitted to the rights registrar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrationRequest {
    pub name: String,
    pub description: String,
    pub properties: RegistrationProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrationProperties {
    pub content_id: String,
    pub title: String,
    pub artist: String,
    pub publisher: String,
    pub isrc: String,
    pub upc: String,
    pub attestation_id: String,
    pub verification_score: f64,
}

impl RegistrationRequest {
    pub fn new(request: &ProtectionRequest, attestation: &AttestationReceipt) -> Self {
        let metadata = &request.metadata;
        Self {
            name: format!("{} - {}", metadata.title, metadata.artist),
            description: format!(
                "Music rights for \"{}\" by {}",
                metadata.title, metadata.artist
            ),
            properties: RegistrationProperties {
                content_id: request.content_id().to_string(),
                title: metadata.title.clone(),
                artist: metadata.artist.clone(),
                publisher: metadata.publisher.clone().unwrap_or_default(),
                isrc: metadata.isrc.clone().unwrap_or_default(),
                upc: metadata.upc.clone().unwrap_or_default(),
                attestation_id: attestation.attestation_id.clone(),
                verification_score: attestation.claim.verification_score,
            },
        }
    }
}

/// What the registrar returns after persisting an ownership record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrationReceipt {
    pub registration_id: String,
    pub ledger_ref: String,
    pub token_uri: Option<String>,
}
