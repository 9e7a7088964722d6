use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};

struct JobEntry {
    job: RwLock<Job>,
    cancel: CancellationToken,
}

/// In-memory store of protection jobs.
///
/// Each job sits behind its own lock, so a mutation is applied atomically and
/// readers only ever see whole snapshots. Jobs live for the lifetime of the
/// registry.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Arc<JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) -> Uuid {
        let id = job.id;
        let entry = Arc::new(JobEntry {
            job: RwLock::new(job),
            cancel: CancellationToken::new(),
        });
        self.jobs.write().await.insert(id, entry);
        id
    }

    async fn entry(&self, id: Uuid) -> Result<Arc<JobEntry>, RegistryError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Snapshot of a job.
    pub async fn get(&self, id: Uuid) -> Result<Job, RegistryError> {
        let entry = self.entry(id).await?;
        let job = entry.job.read().await;
        Ok(job.clone())
    }

    /// Apply `mutate` and recompute the overall status. Terminal jobs are
    /// read-only.
    pub async fn update<F>(&self, id: Uuid, mutate: F) -> Result<JobStatus, RegistryError>
    where
        F: FnOnce(&mut Job),
    {
        let entry = self.entry(id).await?;
        let mut job = entry.job.write().await;
        if job.status.is_terminal() {
            return Err(RegistryError::Finalized {
                id,
                status: job.status,
            });
        }
        mutate(&mut *job);
        Ok(job.refresh_status())
    }

    /// Force a non-terminal job into `Failed`; see [`Job::abort`].
    pub async fn abort(&self, id: Uuid, message: &str) -> Result<(), RegistryError> {
        let entry = self.entry(id).await?;
        let mut job = entry.job.write().await;
        if job.status.is_terminal() {
            return Err(RegistryError::Finalized {
                id,
                status: job.status,
            });
        }
        job.abort(message);
        Ok(())
    }

    /// Trip the job's cancellation token. Holds the job lock so the job
    /// cannot reach a terminal status between the check and the cancel.
    pub async fn cancel(&self, id: Uuid) -> Result<(), RegistryError> {
        let entry = self.entry(id).await?;
        let job = entry.job.read().await;
        if job.status.is_terminal() {
            return Err(RegistryError::Finalized {
                id,
                status: job.status,
            });
        }
        entry.cancel.cancel();
        Ok(())
    }

    pub async fn cancellation_token(&self, id: Uuid) -> Result<CancellationToken, RegistryError> {
        Ok(self.entry(id).await?.cancel.clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {id} already finalized as {status}")]
    Finalized { id: Uuid, status: JobStatus },
}
