use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::content::ProtectionRequest;
use crate::models::ledger::{AttestationReceipt, RegistrationReceipt};
use crate::models::verification::{RequestHandle, VerificationOutcome};

/// Overall status of a protection job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    PartiallyCompleted,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::PartiallyCompleted | JobStatus::Failed
        )
    }
}

/// Status of a single stage within a job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    /// The stage will not change any more within this job.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped
        )
    }
}

/// Name used to tag errors. `Processing` covers failures outside any stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StageName {
    Verification,
    Attestation,
    Registration,
    Processing,
}

/// One entry in a job's append-only error list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobError {
    pub stage: StageName,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Status plus stage-specific result payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageRecord<P> {
    pub status: StageStatus,
    pub result: Option<P>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl<P> Default for StageRecord<P> {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            result: None,
            started_at: None,
            finished_at: None,
        }
    }
}

impl<P> StageRecord<P> {
    pub fn start(&mut self) {
        self.status = StageStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, result: P) {
        self.status = StageStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = StageStatus::Failed;
        self.finished_at = Some(Utc::now());
    }

    pub fn skip(&mut self) {
        self.status = StageStatus::Skipped;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }
}

/// The three stage records of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stages {
    pub verification: StageRecord<VerificationOutcome>,
    /// Handle returned by the verification service, used for status polling.
    pub verification_handle: Option<RequestHandle>,
    pub attestation: StageRecord<AttestationReceipt>,
    pub registration: StageRecord<RegistrationReceipt>,
}

impl Stages {
    /// Verification completed and the decision was positive.
    pub fn verification_passed(&self) -> bool {
        self.verification.is_completed()
            && self
                .verification
                .result
                .as_ref()
                .is_some_and(|outcome| outcome.passed)
    }

    /// Verification completed but the decision was negative.
    pub fn verification_rejected(&self) -> bool {
        self.verification.is_completed() && !self.verification_passed()
    }
}

/// Derive the overall job status from its stage records.
///
/// Total over every combination: stages that can still make progress yield
/// `Submitted` or `Processing`, settled combinations follow the aggregation
/// table (verification failure or rejection fails the job; a passed
/// verification with completed attestation and completed or skipped
/// registration completes it; anything else is partial).
pub fn aggregate(stages: &Stages) -> JobStatus {
    let verification = stages.verification.status;
    let attestation = stages.attestation.status;
    let registration = stages.registration.status;

    if verification == StageStatus::Failed || stages.verification_rejected() {
        return JobStatus::Failed;
    }

    let settled = stages.verification_passed() && attestation.is_settled() && registration.is_settled();
    if !settled {
        let untouched = [verification, attestation, registration]
            .iter()
            .all(|s| *s == StageStatus::Pending);
        return if untouched {
            JobStatus::Submitted
        } else {
            JobStatus::Processing
        };
    }

    let all_negative = [verification, attestation, registration]
        .iter()
        .all(|s| matches!(s, StageStatus::Failed | StageStatus::Skipped));

    match (attestation, registration) {
        (StageStatus::Completed, StageStatus::Completed | StageStatus::Skipped) => {
            JobStatus::Completed
        }
        _ if all_negative => JobStatus::Failed,
        _ => JobStatus::PartiallyCompleted,
    }
}

/// One end-to-end protection request for a single content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub request: ProtectionRequest,
    pub stages: Stages,
    pub errors: Vec<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(request: ProtectionRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Submitted,
            request,
            stages: Stages::default(),
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn record_error(&mut self, stage: StageName, message: impl Into<String>) {
        self.errors.push(JobError {
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Recompute the overall status from the stages; stamps completion when
    /// the result is terminal.
    pub fn refresh_status(&mut self) -> JobStatus {
        let now = Utc::now();
        self.status = aggregate(&self.stages);
        self.updated_at = now;
        if self.status.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status
    }

    /// Force the job into `Failed` after an unrecoverable execution error.
    /// Any stage still pending or in flight is marked failed.
    pub fn abort(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        if !self.stages.verification.status.is_settled() {
            self.stages.verification.fail();
        }
        if !self.stages.attestation.status.is_settled() {
            self.stages.attestation.fail();
        }
        if !self.stages.registration.status.is_settled() {
            self.stages.registration.fail();
        }
        self.record_error(StageName::Processing, message);
        self.status = JobStatus::Failed;
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}
