//! Job record and its lifecycle.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use vista_core::{DomainError, JobId, JobType, OwnerId, ResourceId};

/// Lifecycle state of a job.
///
/// `pending → processing → completed | failed`, plus `failed → pending` on retry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, waiting for the dispatcher.
    Pending,
    /// Claimed by an execution attempt.
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Failed, JobStatus::Pending)
        )
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::validation(format!("unknown job status: {other}"))),
        }
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {job_id}: cannot move from {from} to {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Resources a job's output is written back to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTargets {
    pub target_id: Option<ResourceId>,
    /// Sub-item of `target_id` (e.g. one scene inside a project).
    pub sub_target_id: Option<ResourceId>,
}

impl JobTargets {
    pub fn new(target_id: Option<ResourceId>, sub_target_id: Option<ResourceId>) -> Self {
        Self {
            target_id,
            sub_target_id,
        }
    }

    pub fn primary(target_id: ResourceId) -> Self {
        Self::new(Some(target_id), None)
    }
}

/// One unit of orchestrated AI work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    /// Backend integration that serves this job, recorded at creation.
    pub provider: String,
    pub owner_id: OwnerId,
    pub target_id: Option<ResourceId>,
    pub sub_target_id: Option<ResourceId>,
    pub input: JsonValue,
    /// Set only when completed.
    pub output: Option<JsonValue>,
    pub status: JobStatus,
    /// Set only when failed.
    pub error: Option<String>,
    /// Provider wall-clock time of the last attempt.
    pub duration_ms: Option<u64>,
    /// Fixed at creation, deducted once on completion.
    pub credits_charged: u32,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        owner_id: OwnerId,
        job_type: JobType,
        provider: impl Into<String>,
        targets: JobTargets,
        input: JsonValue,
        credits_charged: u32,
    ) -> Self {
        Self {
            id: JobId::new(),
            job_type,
            provider: provider.into(),
            owner_id,
            target_id: targets.target_id,
            sub_target_id: targets.sub_target_id,
            input,
            output: None,
            status: JobStatus::Pending,
            error: None,
            duration_ms: None,
            credits_charged,
            created_at: Utc::now(),
        }
    }

    pub fn targets(&self) -> JobTargets {
        JobTargets::new(self.target_id, self.sub_target_id)
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                job_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Processing)
    }

    pub fn mark_completed(&mut self, output: JsonValue, duration_ms: u64) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.output = Some(output);
        self.error = None;
        self.duration_ms = Some(duration_ms);
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, duration_ms: u64) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.output = None;
        self.duration_ms = Some(duration_ms);
        Ok(())
    }

    /// Failed → pending, clearing the previous attempt's results.
    pub fn reset_for_retry(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Pending)?;
        self.error = None;
        self.output = None;
        self.duration_ms = None;
        Ok(())
    }

    /// Output/error exclusivity for the current status.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Pending | JobStatus::Processing => self.output.is_none() && self.error.is_none(),
            JobStatus::Completed => self.output.is_some() && self.error.is_none(),
            JobStatus::Failed => self.output.is_none() && self.error.is_some(),
        }
    }

    pub fn matches(&self, filter: &JobFilter) -> bool {
        filter.owner_id.is_none_or(|o| o == self.owner_id)
            && filter.job_type.is_none_or(|t| t == self.job_type)
            && filter.status.is_none_or(|s| s == self.status)
            && filter
                .target_id
                .is_none_or(|t| self.target_id == Some(t) || self.sub_target_id == Some(t))
    }
}

/// Query over jobs, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    pub owner_id: Option<OwnerId>,
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    /// Matches either the primary or the secondary target.
    pub target_id: Option<ResourceId>,
    pub limit: usize,
}

impl JobFilter {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;

    pub fn for_owner(owner_id: OwnerId) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Self::default()
        }
    }
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            owner_id: None,
            job_type: None,
            status: None,
            target_id: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}
