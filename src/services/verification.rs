use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::models::content::{ContentRef, TrackMetadata};
use crate::models::verification::{RequestHandle, VerificationCheck, VerificationOutcome};
use crate::services::poller::{poll_with_backoff, BackoffPolicy, PollError, PollStatus};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(15);

/// Contract of the external verification service.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Submit content for analysis; returns a handle to poll.
    async fn submit(
        &self,
        content: &ContentRef,
        metadata: &TrackMetadata,
    ) -> Result<RequestHandle, VerificationError>;

    /// One status check for a previously submitted request.
    async fn check_status(
        &self,
        handle: &RequestHandle,
    ) -> Result<VerificationCheck, VerificationError>;
}

/// HTTP client for the verification API.
pub struct VerificationApiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    content_id: &'a str,
    content_uri: Option<&'a str>,
    metadata: &'a TrackMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    request_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ResultsResponse {
    status: String,
    results: Option<RawResults>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResults {
    verified: bool,
    confidence_score: f64,
    #[serde(default)]
    analysis: serde_json::Value,
}

impl From<RawResults> for VerificationOutcome {
    fn from(raw: RawResults) -> Self {
        Self {
            passed: raw.verified,
            confidence_score: raw.confidence_score,
            detail: raw.analysis,
        }
    }
}

impl VerificationApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, VerificationError> {
        if base_url.is_empty() || api_key.is_empty() {
            return Err(VerificationError::Config(
                "verification API credentials not configured".to_string(),
            ));
        }
        Ok(Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn fetch_results(
        &self,
        handle: &RequestHandle,
    ) -> Result<VerificationOutcome, VerificationError> {
        let url = format!("{}/verify/results/{}", self.base_url, handle);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let body: ResultsResponse = response.json().await?;
        match body.results {
            Some(results) if body.status == "COMPLETED" => Ok(results.into()),
            _ => Err(VerificationError::Protocol(format!(
                "results requested but request is {}",
                body.status
            ))),
        }
    }
}

#[async_trait]
impl Verifier for VerificationApiClient {
    async fn submit(
        &self,
        content: &ContentRef,
        metadata: &TrackMetadata,
    ) -> Result<RequestHandle, VerificationError> {
        tracing::info!(
            content_id = %content.id,
            title = %metadata.title,
            "Submitting verification request"
        );

        let url = format!("{}/verify", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(SUBMIT_TIMEOUT)
            .json(&SubmitBody {
                content_id: &content.id,
                content_uri: content.uri.as_deref(),
                metadata,
            })
            .send()
            .await?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(VerificationError::Protocol(format!(
                "unexpected response status: {}",
                response.status()
            )));
        }

        let body: SubmitResponse = response.json().await?;
        Ok(RequestHandle(body.request_id))
    }

    async fn check_status(
        &self,
        handle: &RequestHandle,
    ) -> Result<VerificationCheck, VerificationError> {
        let url = format!("{}/verify/status/{}", self.base_url, handle);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let body: StatusResponse = response.json().await?;
        match body.status.as_str() {
            "COMPLETED" => Ok(VerificationCheck::Completed(self.fetch_results(handle).await?)),
            "FAILED" => Ok(VerificationCheck::Failed(
                body.error
                    .unwrap_or_else(|| "Verification failed".to_string()),
            )),
            _ => Ok(VerificationCheck::Pending),
        }
    }
}

/// Runs the verification stage: submit, then poll with backoff until a
/// decision arrives.
#[derive(Clone)]
pub struct VerificationExecutor {
    verifier: Arc<dyn Verifier>,
    policy: BackoffPolicy,
}

impl VerificationExecutor {
    pub fn new(verifier: Arc<dyn Verifier>, policy: BackoffPolicy) -> Self {
        Self { verifier, policy }
    }

    pub async fn submit(
        &self,
        content: &ContentRef,
        metadata: &TrackMetadata,
    ) -> Result<RequestHandle, VerificationError> {
        self.verifier.submit(content, metadata).await
    }

    /// Wait for the decision behind `handle`. A negative decision is still
    /// `Ok`; only service failure, timeout or cancellation are errors.
    pub async fn await_decision(
        &self,
        handle: &RequestHandle,
        cancel: &CancellationToken,
    ) -> Result<VerificationOutcome, VerificationError> {
        let verifier = &self.verifier;
        let outcome = poll_with_backoff(&self.policy, cancel, |attempt| async move {
            tracing::debug!(request_id = %handle, attempt = attempt + 1, "Checking verification status");
            verifier.check_status(handle).await.map(|check| match check {
                VerificationCheck::Pending => PollStatus::Pending,
                VerificationCheck::Completed(outcome) => PollStatus::Ready(outcome),
                VerificationCheck::Failed(reason) => PollStatus::Failed(reason),
            })
        })
        .await?;

        tracing::info!(
            request_id = %handle,
            passed = outcome.passed,
            confidence = outcome.confidence_score,
            "Verification decision received"
        );
        Ok(outcome)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Verification service protocol error: {0}")]
    Protocol(String),

    #[error("Verification service configuration error: {0}")]
    Config(String),

    #[error("Verification service unavailable: {0}")]
    Unavailable(String),

    #[error("Verification failed: {0}")]
    Rejected(String),

    #[error("Verification timed out after {0} status checks")]
    Timeout(u32),

    #[error("Verification cancelled")]
    Cancelled,
}

impl From<PollError> for VerificationError {
    fn from(error: PollError) -> Self {
        match error {
            PollError::Failed(reason) => VerificationError::Rejected(reason),
            PollError::Timeout { attempts } => VerificationError::Timeout(attempts),
            PollError::Check(message) => VerificationError::Unavailable(message),
            PollError::Cancelled => VerificationError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockVerifier;

    fn content() -> (ContentRef, TrackMetadata) {
        (
            ContentRef {
                id: "trk-1".to_string(),
                uri: None,
            },
            TrackMetadata {
                title: "X".to_string(),
                artist: "Y".to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_client_requires_credentials() {
        assert!(VerificationApiClient::new("", "key").is_err());
        assert!(VerificationApiClient::new("https://verify.local", "").is_err());
        assert!(VerificationApiClient::new("https://verify.local/", "key").is_ok());
    }

    #[test]
    fn test_raw_results_normalization() {
        let raw: RawResults = serde_json::from_value(serde_json::json!({
            "verified": true,
            "confidenceScore": 0.87,
            "analysis": { "contentProfile": { "tempo": 120 } }
        }))
        .unwrap();
        let outcome = VerificationOutcome::from(raw);
        assert!(outcome.passed);
        assert_eq!(outcome.confidence_score, 0.87);
        assert_eq!(outcome.detail["contentProfile"]["tempo"], 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_polls_until_decision() {
        let verifier = Arc::new(MockVerifier::passing().ready_after(2));
        let executor = VerificationExecutor::new(verifier.clone(), BackoffPolicy::default());
        let (content, metadata) = content();

        let handle = executor.submit(&content, &metadata).await.unwrap();
        let outcome = executor
            .await_decision(&handle, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.passed);
        assert_eq!(verifier.status_checks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_maps_timeout() {
        let verifier = Arc::new(MockVerifier::passing().ready_after(u32::MAX));
        let policy = BackoffPolicy::new(3, Duration::from_secs(2), 1.5);
        let executor = VerificationExecutor::new(verifier, policy);
        let (content, metadata) = content();

        let handle = executor.submit(&content, &metadata).await.unwrap();
        let err = executor
            .await_decision(&handle, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VerificationError::Timeout(3)));
    }
}
