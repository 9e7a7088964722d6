use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::content::{OwnerRef, ProtectionRequest};
use crate::models::ledger::{AttestationClaim, AttestationReceipt};
use crate::models::verification::VerificationOutcome;

const LEDGER_TIMEOUT: Duration = Duration::from_secs(60);

/// Contract of the attestation ledger.
#[async_trait]
pub trait Attestor: Send + Sync {
    /// Record an immutable claim binding `claim` to `owner`.
    async fn create(
        &self,
        owner: &OwnerRef,
        claim: &AttestationClaim,
    ) -> Result<AttestationReceipt, LedgerError>;
}

/// HTTP client for an attestation gateway fronting the ledger.
pub struct AttestationApiClient {
    http: Client,
    base_url: String,
    api_token: String,
    schema_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    schema_id: &'a str,
    recipient: &'a str,
    data: &'a AttestationClaim,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    uid: String,
    tx_hash: String,
}

impl AttestationApiClient {
    pub fn new(base_url: &str, api_token: &str, schema_id: &str) -> Result<Self, LedgerError> {
        if base_url.is_empty() {
            return Err(LedgerError::Config(
                "attestation ledger URL not configured".to_string(),
            ));
        }
        Ok(Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            schema_id: schema_id.to_string(),
        })
    }
}

#[async_trait]
impl Attestor for AttestationApiClient {
    async fn create(
        &self,
        owner: &OwnerRef,
        claim: &AttestationClaim,
    ) -> Result<AttestationReceipt, LedgerError> {
        let url = format!("{}/attestations", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .timeout(LEDGER_TIMEOUT)
            .json(&CreateBody {
                schema_id: &self.schema_id,
                recipient: &owner.0,
                data: claim,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(format!("{}: {}", status, text)));
        }

        let body: CreateResponse = response.json().await?;
        Ok(AttestationReceipt {
            attestation_id: body.uid,
            ledger_ref: body.tx_hash,
            claim: claim.clone(),
        })
    }
}

/// Runs the attestation stage: one ledger call with the claim built from the
/// submission and the verification decision.
#[derive(Clone)]
pub struct AttestationExecutor {
    attestor: Arc<dyn Attestor>,
}

impl AttestationExecutor {
    pub fn new(attestor: Arc<dyn Attestor>) -> Self {
        Self { attestor }
    }

    pub async fn execute(
        &self,
        request: &ProtectionRequest,
        verification: &VerificationOutcome,
    ) -> Result<AttestationReceipt, LedgerError> {
        let claim = AttestationClaim::new(request, verification);
        let receipt = self.attestor.create(&request.owner, &claim).await?;
        tracing::info!(
            content_id = %claim.content_id,
            attestation_id = %receipt.attestation_id,
            ledger_ref = %receipt.ledger_ref,
            "Attestation recorded"
        );
        Ok(receipt)
    }
}

/// Failures of ledger-backed collaborators (attestation and registration).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ledger rejected the transaction: {0}")]
    Rejected(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{ContentRef, TrackMetadata};
    use crate::services::mock::MockAttestor;

    fn request() -> ProtectionRequest {
        ProtectionRequest::new(
            ContentRef {
                id: "trk-1".to_string(),
                uri: None,
            },
            TrackMetadata {
                track_id: "T-1".to_string(),
                title: "X".to_string(),
                artist: "Y".to_string(),
                isrc: Some("USRC17607839".to_string()),
                ..Default::default()
            },
            OwnerRef("0xowner".to_string()),
        )
    }

    #[tokio::test]
    async fn test_claim_carries_metadata_and_score() {
        let executor = AttestationExecutor::new(Arc::new(MockAttestor::succeeding()));
        let outcome = VerificationOutcome {
            passed: true,
            confidence_score: 0.77,
            detail: serde_json::json!({"contentProfile": {"tempo": 120, "key": "A minor"}}),
        };

        let receipt = executor.execute(&request(), &outcome).await.unwrap();

        assert!(receipt.attestation_id.starts_with("0x"));
        assert_eq!(receipt.claim.content_id, "T-1");
        assert_eq!(receipt.claim.isrc, "USRC17607839");
        assert_eq!(receipt.claim.upc, "");
        assert_eq!(receipt.claim.verification_score, 0.77);
        assert_eq!(receipt.claim.fingerprint["tempo"], 120);
    }

    #[test]
    fn test_claim_fingerprint_defaults_to_empty_object() {
        let outcome = VerificationOutcome {
            passed: true,
            confidence_score: 0.9,
            detail: serde_json::Value::Null,
        };

        let claim = AttestationClaim::new(&request(), &outcome);
        assert_eq!(claim.fingerprint, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_ledger_failure_propagates() {
        let executor = AttestationExecutor::new(Arc::new(MockAttestor::failing()));
        let outcome = VerificationOutcome {
            passed: true,
            confidence_score: 0.9,
            detail: serde_json::Value::Null,
        };

        let err = executor.execute(&request(), &outcome).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(_)));
    }

    #[test]
    fn test_client_requires_url() {
        assert!(AttestationApiClient::new("", "token", "schema").is_err());
    }
}
