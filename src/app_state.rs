use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    attestation::{AttestationApiClient, AttestationExecutor, Attestor, LedgerError},
    mock::{MockAttestor, MockRegistrar, MockVerifier},
    poller::BackoffPolicy,
    queue::IntakeQueue,
    registration::{Registrar, RegistrarApiClient, RegistrationExecutor},
    registry::JobRegistry,
    verification::{VerificationApiClient, VerificationError, VerificationExecutor, Verifier},
};

/// Shared state handed to the orchestrator and every job execution.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub verification: VerificationExecutor,
    pub attestation: AttestationExecutor,
    /// `None` when no registrar is configured at all.
    pub registration: Option<RegistrationExecutor>,
}

impl AppState {
    pub fn new(
        verifier: Arc<dyn Verifier>,
        attestor: Arc<dyn Attestor>,
        registrar: Option<Arc<dyn Registrar>>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            verification: VerificationExecutor::new(verifier, backoff),
            attestation: AttestationExecutor::new(attestor),
            registration: registrar.map(RegistrationExecutor::new),
        }
    }

    /// Wire collaborators from configuration. Must run inside a Tokio runtime
    /// when the intake queue is enabled.
    pub async fn from_config(config: &AppConfig) -> Result<Self, SetupError> {
        let verifier: Arc<dyn Verifier>;
        let attestor: Arc<dyn Attestor>;
        let registrar: Option<Arc<dyn Registrar>>;

        if config.mock_mode {
            tracing::info!("Running in mock mode, using simulated collaborators");
            verifier = Arc::new(MockVerifier::passing().ready_after(1));
            attestor = Arc::new(MockAttestor::succeeding());
            registrar = if config.mock_registrar {
                Some(Arc::new(MockRegistrar::succeeding()))
            } else {
                None
            };
        } else {
            verifier = Arc::new(VerificationApiClient::new(
                config.verification_api_url.as_deref().unwrap_or_default(),
                config.verification_api_key.as_deref().unwrap_or_default(),
            )?);
            attestor = Arc::new(AttestationApiClient::new(
                config.attestation_api_url.as_deref().unwrap_or_default(),
                &config.attestation_api_token,
                &config.attestation_schema_id,
            )?);
            registrar = match &config.registrar_api_url {
                Some(url) => {
                    tracing::info!(url = %url, "Connecting to rights registrar");
                    Some(Arc::new(
                        RegistrarApiClient::connect(url, &config.registrar_api_token).await,
                    ))
                }
                None => {
                    tracing::warn!("Rights registrar not configured, registration will be skipped");
                    None
                }
            };
        }

        let verifier: Arc<dyn Verifier> = if config.serialize_verification {
            tracing::info!(
                settle_delay_ms = config.queue_settle_delay_ms,
                "Routing verification through the intake queue"
            );
            Arc::new(IntakeQueue::start(verifier, config.queue_settle_delay()))
        } else {
            verifier
        };

        Ok(Self::new(verifier, attestor, registrar, config.backoff_policy()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Verification service setup failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("Attestation ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),
}
