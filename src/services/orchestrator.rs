//! Protection job orchestration.
//!
//! Every submitted job gets exactly one background execution which walks the
//! stages in order (verification, attestation, registration) and records each
//! transition in the job registry. Stage failures are captured on the job,
//! never returned to the submitter.

use std::future::Future;
use std::time::Instant;

use garde::Validate;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::content::{ContentRef, OwnerRef, ProtectionRequest, TrackMetadata};
use crate::models::job::{Job, JobStatus, StageName};
use crate::models::report::{JobResults, JobStatusSummary, SubmitReceipt};
use crate::services::attestation::LedgerError;
use crate::services::registry::RegistryError;
use crate::services::verification::VerificationError;

const EVENT_CAPACITY: usize = 256;

/// Published whenever a job reaches a terminal status.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Drives protection jobs through the pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    state: AppState,
    events: broadcast::Sender<JobEvent>,
}

impl Orchestrator {
    pub fn new(state: AppState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { state, events }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Receive terminal job events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Validate and register a job, then start its execution in the
    /// background. Returns without waiting on any collaborator.
    pub async fn submit(
        &self,
        content: ContentRef,
        metadata: TrackMetadata,
        owner: OwnerRef,
    ) -> Result<SubmitReceipt, OrchestratorError> {
        let request = ProtectionRequest::new(content, metadata, owner);
        request
            .validate()
            .map_err(|report| OrchestratorError::Validation(report.to_string()))?;

        tracing::info!(
            content_id = %request.content.id,
            title = %request.metadata.title,
            artist = %request.metadata.artist,
            "Submitting protection request"
        );

        let job = Job::new(request);
        let receipt = SubmitReceipt::from(&job);
        let job_id = self.state.registry.insert(job).await;
        let cancel = self.state.registry.cancellation_token(job_id).await?;

        metrics::counter!("protection_jobs_submitted_total").increment(1);
        self.spawn_execution(job_id, cancel);

        Ok(receipt)
    }

    pub async fn get_status(&self, job_id: Uuid) -> Result<JobStatusSummary, OrchestratorError> {
        let job = self.state.registry.get(job_id).await?;
        Ok(JobStatusSummary::from(&job))
    }

    /// Full record of a job; only available once the job is terminal.
    pub async fn get_results(&self, job_id: Uuid) -> Result<JobResults, OrchestratorError> {
        let job = self.state.registry.get(job_id).await?;
        if !job.status.is_terminal() {
            return Err(OrchestratorError::InvalidState {
                job_id,
                status: job.status,
            });
        }
        Ok(JobResults::from(&job))
    }

    /// Request cancellation. The stage in flight is failed and the job is
    /// finalised through the normal aggregation.
    pub async fn cancel(&self, job_id: Uuid) -> Result<(), OrchestratorError> {
        self.state.registry.cancel(job_id).await?;
        tracing::info!(job_id = %job_id, "Cancelling protection job");
        Ok(())
    }

    /// Spawn the execution plus a supervisor that finalises the job if the
    /// execution task dies.
    fn spawn_execution(&self, job_id: Uuid, cancel: CancellationToken) {
        let pipeline = self.clone();
        let worker = tokio::spawn(async move { pipeline.execute(job_id, cancel).await });

        let supervisor = self.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                tracing::error!(job_id = %job_id, error = %e, "Job execution crashed");
                supervisor
                    .abort(job_id, &format!("Unhandled error: {}", e))
                    .await;
            }
        });
    }

    async fn execute(&self, job_id: Uuid, cancel: CancellationToken) {
        let started = Instant::now();
        tracing::info!(job_id = %job_id, "Processing protection job");

        match self.run(job_id, &cancel).await {
            Ok(status) => {
                metrics::histogram!("protection_job_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                self.finished(job_id, status);
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Unhandled error processing job");
                self.abort(job_id, &format!("Unhandled error: {}", e)).await;
            }
        }
    }

    async fn run(&self, job_id: Uuid, cancel: &CancellationToken) -> Result<JobStatus, RegistryError> {
        let registry = &self.state.registry;
        let request = registry.get(job_id).await?.request;

        // Verification
        registry
            .update(job_id, |job| job.stages.verification.start())
            .await?;

        let handle = match guarded(
            cancel,
            self.state
                .verification
                .submit(&request.content, &request.metadata),
        )
        .await
        {
            Ok(handle) => handle,
            Err(e) => return self.fail_stage(job_id, StageName::Verification, e).await,
        };
        tracing::debug!(job_id = %job_id, request_id = %handle, "Verification request accepted");
        registry
            .update(job_id, |job| {
                job.stages.verification_handle = Some(handle.clone())
            })
            .await?;

        let outcome = match self
            .state
            .verification
            .await_decision(&handle, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return self.fail_stage(job_id, StageName::Verification, e.into()).await,
        };

        let passed = outcome.passed;
        let status = registry
            .update(job_id, |job| {
                if !passed {
                    job.record_error(StageName::Verification, "Content failed verification check");
                }
                job.stages.verification.complete(outcome.clone());
            })
            .await?;
        if !passed {
            tracing::warn!(job_id = %job_id, "Content failed verification check");
            return Ok(status);
        }

        // Attestation
        registry
            .update(job_id, |job| job.stages.attestation.start())
            .await?;

        let attestation = match guarded(
            cancel,
            self.state.attestation.execute(&request, &outcome),
        )
        .await
        {
            Ok(receipt) => receipt,
            Err(e) => return self.fail_stage(job_id, StageName::Attestation, e).await,
        };
        registry
            .update(job_id, |job| job.stages.attestation.complete(attestation.clone()))
            .await?;

        // Registration
        let registration = match &self.state.registration {
            Some(executor) if executor.is_available() => executor,
            _ => {
                tracing::info!(job_id = %job_id, "Skipping rights registration (service not available)");
                return registry
                    .update(job_id, |job| job.stages.registration.skip())
                    .await;
            }
        };

        registry
            .update(job_id, |job| job.stages.registration.start())
            .await?;

        match guarded(cancel, registration.execute(&request, &attestation)).await {
            Ok(receipt) => {
                registry
                    .update(job_id, |job| job.stages.registration.complete(receipt))
                    .await
            }
            Err(e) => self.fail_stage(job_id, StageName::Registration, e).await,
        }
    }

    /// Record a stage failure. A failed attestation also settles registration
    /// as skipped, since there is nothing to register.
    async fn fail_stage(
        &self,
        job_id: Uuid,
        stage: StageName,
        error: StageError,
    ) -> Result<JobStatus, RegistryError> {
        tracing::error!(job_id = %job_id, stage = %stage, error = %error, "Stage failed");
        metrics::counter!("protection_stage_failures_total", "stage" => stage.to_string())
            .increment(1);

        let message = error.to_string();
        self.state
            .registry
            .update(job_id, |job| {
                job.record_error(stage, message);
                match stage {
                    StageName::Verification => job.stages.verification.fail(),
                    StageName::Attestation => {
                        job.stages.attestation.fail();
                        job.stages.registration.skip();
                    }
                    StageName::Registration => job.stages.registration.fail(),
                    StageName::Processing => {}
                }
            })
            .await
    }

    async fn abort(&self, job_id: Uuid, message: &str) {
        match self.state.registry.abort(job_id, message).await {
            Ok(()) => self.finished(job_id, JobStatus::Failed),
            Err(RegistryError::Finalized { .. }) => {
                tracing::debug!(job_id = %job_id, "Job already finalised, nothing to abort");
            }
            Err(e) => tracing::error!(job_id = %job_id, error = %e, "Failed to abort job"),
        }
    }

    fn finished(&self, job_id: Uuid, status: JobStatus) {
        tracing::info!(job_id = %job_id, status = %status, "Job finished");
        metrics::counter!("protection_jobs_finished_total", "status" => status.to_string())
            .increment(1);
        // No subscribers is fine.
        let _ = self.events.send(JobEvent { job_id, status });
    }
}

/// Run a stage call unless the job is cancelled first.
async fn guarded<T, E, F>(cancel: &CancellationToken, call: F) -> Result<T, StageError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<StageError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StageError::Cancelled),
        result = call => result.map_err(Into::into),
    }
}

/// Why a stage did not complete. Recorded on the job, never surfaced to the
/// submitter.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Job cancelled")]
    Cancelled,
}

/// Errors returned to callers of the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {job_id} is {status}")]
    InvalidState { job_id: Uuid, status: JobStatus },
}

impl From<RegistryError> for OrchestratorError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(id) => OrchestratorError::NotFound(id),
            RegistryError::Finalized { id, status } => {
                OrchestratorError::InvalidState { job_id: id, status }
            }
        }
    }
}
