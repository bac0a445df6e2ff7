//! Public job surface: admission, submission, retry and queries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use vista_ai::{JobInput, ProviderRegistry};
use vista_core::{DomainError, JobId, JobType, OwnerId};

use crate::dispatcher::Dispatcher;
use crate::jobs::{Job, JobFilter, JobStats, JobStatus, JobStore, JobStoreError, JobTargets, RecoveredJobs};
use crate::ledger::{CreditLedger, LedgerError, UsageSummary};

/// Credit cost per job type, resolved once at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPricing {
    default_cost: u32,
    overrides: HashMap<JobType, u32>,
}

impl Default for CreditPricing {
    fn default() -> Self {
        Self::flat(1)
    }
}

impl CreditPricing {
    pub fn flat(cost: u32) -> Self {
        Self {
            default_cost: cost,
            overrides: HashMap::new(),
        }
    }

    pub fn with_cost(mut self, job_type: JobType, cost: u32) -> Self {
        self.overrides.insert(job_type, cost);
        self
    }

    pub fn cost_of(&self, job_type: JobType) -> u32 {
        self.overrides.get(&job_type).copied().unwrap_or(self.default_cost)
    }
}

/// Submission request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitJob {
    pub owner_id: OwnerId,
    pub job_type: JobType,
    pub targets: JobTargets,
    pub input: JsonValue,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("quota exceeded for owner {owner_id}")]
    AdmissionRejected { owner_id: OwnerId, remaining: i64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {job_id} is {status}")]
    InvalidState { job_id: JobId, status: JobStatus },
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            other => ServiceError::Infrastructure(other.to_string()),
        }
    }
}

impl From<JobStoreError> for ServiceError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => ServiceError::NotFound(id),
            JobStoreError::InvalidTransition(t) => ServiceError::InvalidState {
                job_id: t.job_id,
                status: t.from,
            },
            other => ServiceError::Infrastructure(other.to_string()),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        ServiceError::Infrastructure(err.to_string())
    }
}

pub struct JobService {
    jobs: Arc<dyn JobStore>,
    ledger: Arc<dyn CreditLedger>,
    providers: Arc<ProviderRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    pricing: CreditPricing,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        ledger: Arc<dyn CreditLedger>,
        providers: Arc<ProviderRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
        pricing: CreditPricing,
    ) -> Self {
        Self {
            jobs,
            ledger,
            providers,
            dispatcher,
            pricing,
        }
    }

    /// Validate, admit, persist (pending) and schedule a job.
    ///
    /// Rejections happen before any job record exists.
    #[instrument(skip(self, request), fields(owner_id = %request.owner_id, job_type = %request.job_type), err)]
    pub async fn submit_job(&self, request: SubmitJob) -> Result<Job, ServiceError> {
        if request.targets.sub_target_id.is_some() && request.targets.target_id.is_none() {
            return Err(ServiceError::Validation(
                "sub_target_id requires target_id".to_string(),
            ));
        }
        JobInput::parse(request.job_type, &request.input)?;

        let provider = self
            .providers
            .get(request.job_type)
            .ok_or_else(|| {
                ServiceError::Validation(format!("no provider configured for {}", request.job_type))
            })?
            .name()
            .to_string();

        let decision = self.ledger.check_admission(request.owner_id).await?;
        if !decision.allowed {
            info!(owner_id = %request.owner_id, "admission rejected: quota exceeded");
            return Err(ServiceError::AdmissionRejected {
                owner_id: request.owner_id,
                remaining: decision.remaining,
            });
        }

        let job = Job::new(
            request.owner_id,
            request.job_type,
            provider,
            request.targets,
            request.input,
            self.pricing.cost_of(request.job_type),
        );
        let job = self.jobs.insert(job).await?;
        info!(job_id = %job.id, provider = %job.provider, credits = job.credits_charged, "job accepted");

        self.dispatcher.schedule(job.id, Duration::ZERO);
        Ok(job)
    }

    /// Reset a failed job to pending and re-dispatch it on the same id.
    ///
    /// Admission is not re-checked and `credits_charged` is kept.
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn retry_job(&self, job_id: JobId) -> Result<Job, ServiceError> {
        let job = self.get_job(job_id).await?;
        if job.status != JobStatus::Failed {
            return Err(ServiceError::InvalidState {
                job_id,
                status: job.status,
            });
        }

        let job = self.jobs.reset_for_retry(job_id).await?;
        info!(job_id = %job.id, "job reset for retry");
        self.dispatcher.schedule(job.id, Duration::ZERO);
        Ok(job)
    }

    /// Fail jobs interrupted mid-execution and re-dispatch pending ones.
    ///
    /// Run once at startup, before accepting requests.
    #[instrument(skip(self), err)]
    pub async fn recover_interrupted(&self) -> Result<RecoveredJobs, ServiceError> {
        let recovered = self.jobs.recover_interrupted().await?;
        for job_id in &recovered.pending {
            self.dispatcher.schedule(*job_id, Duration::ZERO);
        }
        info!(
            failed = recovered.failed.len(),
            rescheduled = recovered.pending.len(),
            "recovered interrupted jobs"
        );
        Ok(recovered)
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<Job, ServiceError> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))
    }

    /// Newest first; `limit` is clamped to `1..=JobFilter::MAX_LIMIT`.
    pub async fn list_jobs(&self, mut filter: JobFilter) -> Result<Vec<Job>, ServiceError> {
        filter.limit = filter.limit.clamp(1, JobFilter::MAX_LIMIT);
        Ok(self.jobs.list(&filter).await?)
    }

    pub async fn get_usage(&self, owner_id: OwnerId) -> Result<UsageSummary, ServiceError> {
        Ok(self.ledger.usage(owner_id).await?)
    }

    pub async fn job_stats(&self, owner_id: OwnerId) -> Result<JobStats, ServiceError> {
        Ok(self.jobs.stats(owner_id).await?)
    }
}
