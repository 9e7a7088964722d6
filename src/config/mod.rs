use serde::Deserialize;
use std::time::Duration;

use crate::services::poller::BackoffPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Use in-process mock collaborators instead of the HTTP services.
    #[serde(default)]
    pub mock_mode: bool,

    /// Whether mock mode wires a rights registrar.
    #[serde(default = "default_true")]
    pub mock_registrar: bool,

    /// Verification API base URL (e.g. "https://verify.example.com/v1")
    pub verification_api_url: Option<String>,

    /// Bearer token for the verification API
    pub verification_api_key: Option<String>,

    /// Attestation gateway base URL
    pub attestation_api_url: Option<String>,

    /// Bearer token for the attestation gateway
    #[serde(default)]
    pub attestation_api_token: String,

    /// Schema the attestations are recorded under
    #[serde(default)]
    pub attestation_schema_id: String,

    /// Rights registrar base URL. Registration is skipped when unset.
    pub registrar_api_url: Option<String>,

    /// Bearer token for the rights registrar
    #[serde(default)]
    pub registrar_api_token: String,

    /// Maximum verification status checks per job
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Delay before the first status check, in milliseconds
    #[serde(default = "default_poll_base_delay_ms")]
    pub poll_base_delay_ms: u64,

    /// Growth factor applied to the delay after each check
    #[serde(default = "default_poll_factor")]
    pub poll_factor: f64,

    /// Route all verification calls through the single-consumer intake queue
    #[serde(default)]
    pub serialize_verification: bool,

    /// Pause between intake queue items, in milliseconds
    #[serde(default = "default_queue_settle_delay_ms")]
    pub queue_settle_delay_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_max_attempts() -> u32 {
    10
}

fn default_poll_base_delay_ms() -> u64 {
    2000
}

fn default_poll_factor() -> f64 {
    1.5
}

fn default_queue_settle_delay_ms() -> u64 {
    100
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.poll_max_attempts,
            Duration::from_millis(self.poll_base_delay_ms),
            self.poll_factor,
        )
    }

    pub fn queue_settle_delay(&self) -> Duration {
        Duration::from_millis(self.queue_settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: AppConfig = envy::from_iter(vec![(
            "MOCK_MODE".to_string(),
            "true".to_string(),
        )])
        .unwrap();

        assert!(config.mock_mode);
        assert!(config.mock_registrar);
        assert!(config.registrar_api_url.is_none());
        assert_eq!(config.backoff_policy(), BackoffPolicy::default());
        assert_eq!(config.queue_settle_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_overrides() {
        let config: AppConfig = envy::from_iter(vec![
            ("POLL_MAX_ATTEMPTS".to_string(), "3".to_string()),
            ("POLL_BASE_DELAY_MS".to_string(), "500".to_string()),
            ("POLL_FACTOR".to_string(), "2.0".to_string()),
            ("SERIALIZE_VERIFICATION".to_string(), "true".to_string()),
        ])
        .unwrap();

        let policy = config.backoff_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert!(config.serialize_verification);
        assert!(!config.mock_mode);
    }
}
