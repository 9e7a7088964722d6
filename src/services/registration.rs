use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::content::{OwnerRef, ProtectionRequest};
use crate::models::ledger::{AttestationReceipt, RegistrationReceipt, RegistrationRequest};
use crate::services::attestation::LedgerError;

const REGISTER_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Contract of the optional rights registrar.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Capability probe. When `false` the registration stage is skipped
    /// rather than failed.
    fn is_available(&self) -> bool;

    async fn register(
        &self,
        owner: &OwnerRef,
        request: &RegistrationRequest,
        attestation_id: &str,
    ) -> Result<RegistrationReceipt, LedgerError>;
}

/// HTTP client for the rights registrar.
pub struct RegistrarApiClient {
    http: Client,
    base_url: String,
    api_token: String,
    available: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    owner: &'a str,
    attestation_uid: &'a str,
    metadata: &'a RegistrationRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    token_id: String,
    tx_hash: String,
    #[serde(default)]
    token_uri: Option<String>,
}

impl RegistrarApiClient {
    /// Build the client and probe the registrar's health endpoint once. A
    /// failed probe leaves the client constructed but unavailable.
    pub async fn connect(base_url: &str, api_token: &str) -> Self {
        let http = Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        let available = match http
            .get(format!("{}/health", base_url))
            .bearer_auth(api_token)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Rights registrar health check failed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rights registrar unreachable, registration will be skipped");
                false
            }
        };

        Self {
            http,
            base_url,
            api_token: api_token.to_string(),
            available,
        }
    }
}

#[async_trait]
impl Registrar for RegistrarApiClient {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn register(
        &self,
        owner: &OwnerRef,
        request: &RegistrationRequest,
        attestation_id: &str,
    ) -> Result<RegistrationReceipt, LedgerError> {
        let url = format!("{}/registrations", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .timeout(REGISTER_TIMEOUT)
            .json(&RegisterBody {
                owner: &owner.0,
                attestation_uid: attestation_id,
                metadata: request,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(format!("{}: {}", status, text)));
        }

        let body: RegisterResponse = response.json().await?;
        Ok(RegistrationReceipt {
            registration_id: body.token_id,
            ledger_ref: body.tx_hash,
            token_uri: body.token_uri,
        })
    }
}

/// Runs the registration stage against the attested rights.
#[derive(Clone)]
pub struct RegistrationExecutor {
    registrar: Arc<dyn Registrar>,
}

impl RegistrationExecutor {
    pub fn new(registrar: Arc<dyn Registrar>) -> Self {
        Self { registrar }
    }

    pub fn is_available(&self) -> bool {
        self.registrar.is_available()
    }

    pub async fn execute(
        &self,
        request: &ProtectionRequest,
        attestation: &AttestationReceipt,
    ) -> Result<RegistrationReceipt, LedgerError> {
        let token_request = RegistrationRequest::new(request, attestation);
        let receipt = self
            .registrar
            .register(&request.owner, &token_request, &attestation.attestation_id)
            .await?;
        tracing::info!(
            content_id = %token_request.properties.content_id,
            registration_id = %receipt.registration_id,
            ledger_ref = %receipt.ledger_ref,
            "Rights registered"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{ContentRef, TrackMetadata};
    use crate::models::ledger::AttestationClaim;
    use crate::services::mock::MockRegistrar;
    use chrono::Utc;

    fn request() -> ProtectionRequest {
        ProtectionRequest::new(
            ContentRef {
                id: "trk-9".to_string(),
                uri: Some("ipfs://bafy".to_string()),
            },
            TrackMetadata {
                title: "Night Drive".to_string(),
                artist: "Lumen".to_string(),
                publisher: Some("Northside".to_string()),
                ..Default::default()
            },
            OwnerRef("0xowner".to_string()),
        )
    }

    fn attestation() -> AttestationReceipt {
        AttestationReceipt {
            attestation_id: "0xatt".to_string(),
            ledger_ref: "0xtx".to_string(),
            claim: AttestationClaim {
                content_id: "trk-9".to_string(),
                title: "Night Drive".to_string(),
                artist: "Lumen".to_string(),
                publisher: "Northside".to_string(),
                isrc: String::new(),
                upc: String::new(),
                verification_score: 0.81,
                verification_timestamp: Utc::now(),
                fingerprint: serde_json::json!({}),
            },
        }
    }

    #[test]
    fn test_token_metadata() {
        let token = RegistrationRequest::new(&request(), &attestation());
        assert_eq!(token.name, "Night Drive - Lumen");
        assert_eq!(token.description, "Music rights for \"Night Drive\" by Lumen");
        assert_eq!(token.properties.attestation_id, "0xatt");
        assert_eq!(token.properties.verification_score, 0.81);
        assert_eq!(token.properties.content_id, "trk-9");
    }

    #[tokio::test]
    async fn test_executor_registers() {
        let registrar = Arc::new(MockRegistrar::succeeding());
        let executor = RegistrationExecutor::new(registrar.clone());

        assert!(executor.is_available());
        let receipt = executor.execute(&request(), &attestation()).await.unwrap();

        assert_eq!(receipt.registration_id, "1");
        assert_eq!(receipt.token_uri.as_deref(), Some("mock://rights/trk-9"));
        assert_eq!(registrar.registered(), 1);
    }

    #[test]
    fn test_offline_registrar_probe() {
        let executor = RegistrationExecutor::new(Arc::new(MockRegistrar::offline()));
        assert!(!executor.is_available());
    }
}
