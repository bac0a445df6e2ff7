//! Job record storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use vista_core::{JobId, OwnerId};

use super::types::{Job, JobFilter, JobStatus, TransitionError};

/// Durable home of job records.
///
/// Every state change is a single atomic operation on one record; callers never
/// read-modify-write a job themselves.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    async fn insert(&self, job: Job) -> Result<Job, JobStoreError>;

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Atomically move a pending job to processing.
    ///
    /// Fails with [`JobStoreError::AlreadyClaimed`] when the job is no longer pending.
    async fn claim(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    async fn complete(
        &self,
        job_id: JobId,
        output: JsonValue,
        duration_ms: u64,
    ) -> Result<Job, JobStoreError>;

    async fn fail(&self, job_id: JobId, error: String, duration_ms: u64) -> Result<Job, JobStoreError>;

    /// Atomically move a failed job back to pending, clearing output/error/duration.
    async fn reset_for_retry(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    /// Jobs matching `filter`, newest first, at most `filter.limit`.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError>;

    async fn stats(&self, owner_id: OwnerId) -> Result<JobStats, JobStoreError>;

    /// Startup sweep for jobs left behind by a previous process.
    ///
    /// Processing jobs are failed with [`INTERRUPTED_ERROR`] so they become
    /// retryable. Pending jobs are returned oldest first for re-scheduling.
    /// Assumes no other process is executing jobs against the same store.
    async fn recover_interrupted(&self) -> Result<RecoveredJobs, JobStoreError>;
}

/// Error recorded on jobs that were processing when the previous process stopped.
pub const INTERRUPTED_ERROR: &str = "interrupted";

/// Outcome of [`JobStore::recover_interrupted`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveredJobs {
    /// Jobs moved from processing to failed.
    pub failed: Vec<JobId>,
    /// Jobs still pending that need a dispatch.
    pub pending: Vec<JobId>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("job already claimed: {0}")]
    AlreadyClaimed(JobId),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Per-owner job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobStats {
    pub fn record(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".to_string()))
    }

    /// Apply `f` to one job under the write lock; the job is only replaced if `f` succeeds.
    fn update<F>(&self, job_id: JobId, f: F) -> Result<Job, JobStoreError>
    where
        F: FnOnce(&mut Job) -> Result<(), JobStoreError>,
    {
        let mut jobs = self.write()?;
        let current = jobs.get(&job_id).ok_or(JobStoreError::NotFound(job_id))?;
        let mut next = current.clone();
        f(&mut next)?;
        jobs.insert(job_id, next.clone());
        Ok(next)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) -> Result<Job, JobStoreError> {
        let mut jobs = self.write()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.read()?.get(&job_id).cloned())
    }

    async fn claim(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        self.update(job_id, |job| {
            if job.status != JobStatus::Pending {
                return Err(JobStoreError::AlreadyClaimed(job_id));
            }
            Ok(job.mark_processing()?)
        })
    }

    async fn complete(
        &self,
        job_id: JobId,
        output: JsonValue,
        duration_ms: u64,
    ) -> Result<Job, JobStoreError> {
        self.update(job_id, |job| Ok(job.mark_completed(output, duration_ms)?))
    }

    async fn fail(&self, job_id: JobId, error: String, duration_ms: u64) -> Result<Job, JobStoreError> {
        self.update(job_id, |job| Ok(job.mark_failed(error, duration_ms)?))
    }

    async fn reset_for_retry(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        self.update(job_id, |job| Ok(job.reset_for_retry()?))
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.read()?;
        let mut result: Vec<_> = jobs.values().filter(|j| j.matches(filter)).cloned().collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        result.truncate(filter.limit);
        Ok(result)
    }

    async fn stats(&self, owner_id: OwnerId) -> Result<JobStats, JobStoreError> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();
        for job in jobs.values().filter(|j| j.owner_id == owner_id) {
            stats.record(job.status, 1);
        }
        Ok(stats)
    }

    async fn recover_interrupted(&self) -> Result<RecoveredJobs, JobStoreError> {
        let mut jobs = self.write()?;
        let mut recovered = RecoveredJobs::default();

        for job in jobs.values_mut() {
            if job.status == JobStatus::Processing {
                job.mark_failed(INTERRUPTED_ERROR, 0)?;
                recovered.failed.push(job.id);
            }
        }

        let mut pending: Vec<_> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| (j.created_at, j.id))
            .collect();
        pending.sort();
        recovered.pending = pending.into_iter().map(|(_, id)| id).collect();

        Ok(recovered)
    }
}
