use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::job::{Job, JobError, JobStatus, StageStatus};
use crate::models::ledger::{AttestationReceipt, RegistrationReceipt};
use crate::models::verification::VerificationOutcome;

/// Returned from submit: the job id plus an echo of what was submitted.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub track_id: String,
    pub title: String,
    pub artist: String,
}

impl From<&Job> for SubmitReceipt {
    fn from(job: &Job) -> Self {
        let metadata = &job.request.metadata;
        Self {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
            track_id: metadata.track_id.clone(),
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
        }
    }
}

/// Lightweight progress view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusSummary {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub verification: VerificationProgress,
    pub attestation: AttestationProgress,
    pub registration: RegistrationProgress,
    pub errors: Vec<JobError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationProgress {
    pub status: StageStatus,
    pub completed: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttestationProgress {
    pub status: StageStatus,
    pub completed: bool,
    pub attestation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationProgress {
    pub status: StageStatus,
    pub completed: bool,
    pub registration_id: Option<String>,
}

impl From<&Job> for JobStatusSummary {
    fn from(job: &Job) -> Self {
        let stages = &job.stages;
        Self {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            verification: VerificationProgress {
                status: stages.verification.status,
                completed: stages.verification.is_completed(),
                verified: stages.verification_passed(),
            },
            attestation: AttestationProgress {
                status: stages.attestation.status,
                completed: stages.attestation.is_completed(),
                attestation_id: stages
                    .attestation
                    .result
                    .as_ref()
                    .map(|r| r.attestation_id.clone()),
            },
            registration: RegistrationProgress {
                status: stages.registration.status,
                completed: stages.registration.is_completed(),
                registration_id: stages
                    .registration
                    .result
                    .as_ref()
                    .map(|r| r.registration_id.clone()),
            },
            errors: job.errors.clone(),
        }
    }
}

/// Full record of a terminal job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResults {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub content_id: String,
    pub title: String,
    pub artist: String,
    pub publisher: Option<String>,
    pub isrc: Option<String>,
    pub upc: Option<String>,
    pub owner: String,
    pub verification: StageResult<VerificationOutcome>,
    pub attestation: StageResult<AttestationReceipt>,
    pub registration: StageResult<RegistrationReceipt>,
    pub errors: Vec<JobError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageResult<P> {
    pub status: StageStatus,
    pub successful: bool,
    pub result: Option<P>,
}

impl JobResults {
    pub fn attestation_id(&self) -> Option<&str> {
        self.attestation
            .result
            .as_ref()
            .map(|r| r.attestation_id.as_str())
    }

    pub fn registration_id(&self) -> Option<&str> {
        self.registration
            .result
            .as_ref()
            .map(|r| r.registration_id.as_str())
    }
}

impl From<&Job> for JobResults {
    fn from(job: &Job) -> Self {
        let metadata = &job.request.metadata;
        let stages = &job.stages;
        Self {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
            completed_at: job.completed_at,
            content_id: job.request.content_id().to_string(),
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            publisher: metadata.publisher.clone(),
            isrc: metadata.isrc.clone(),
            upc: metadata.upc.clone(),
            owner: job.request.owner.to_string(),
            verification: StageResult {
                status: stages.verification.status,
                successful: stages.verification_passed(),
                result: stages.verification.result.clone(),
            },
            attestation: StageResult {
                status: stages.attestation.status,
                successful: stages.attestation.is_completed(),
                result: stages.attestation.result.clone(),
            },
            registration: StageResult {
                status: stages.registration.status,
                successful: stages.registration.is_completed(),
                result: stages.registration.result.clone(),
            },
            errors: job.errors.clone(),
        }
    }
}
