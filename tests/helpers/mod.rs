//! Test helper utilities for pipeline testing

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use uuid::Uuid;

use track_guard::models::report::JobResults;
use track_guard::services::attestation::Attestor;
use track_guard::services::poller::BackoffPolicy;
use track_guard::services::registration::Registrar;
use track_guard::services::verification::Verifier;
use track_guard::{AppState, Orchestrator, OrchestratorError};

/// Short backoff so paused-clock tests stay readable
pub fn fast_policy() -> BackoffPolicy {
    BackoffPolicy::new(5, Duration::from_millis(100), 1.5)
}

/// Build an orchestrator around the given collaborators
pub fn orchestrator(
    verifier: Arc<dyn Verifier>,
    attestor: Arc<dyn Attestor>,
    registrar: Option<Arc<dyn Registrar>>,
) -> Orchestrator {
    Orchestrator::new(AppState::new(verifier, attestor, registrar, fast_policy()))
}

/// Poll job results until the job is terminal (with timeout)
pub async fn wait_for_results(
    orchestrator: &Orchestrator,
    job_id: Uuid,
    timeout_secs: u64,
) -> JobResults {
    let max_attempts = timeout_secs * 20; // Poll every 50ms

    for _ in 0..max_attempts {
        match orchestrator.get_results(job_id).await {
            Ok(results) => return results,
            Err(OrchestratorError::InvalidState { .. }) => {
                sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Unexpected error waiting for job {}: {}", job_id, e),
        }
    }

    panic!("Job {} did not finish within {} seconds", job_id, timeout_secs);
}
