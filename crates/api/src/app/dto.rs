use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use vista_core::{JobId, JobType, OwnerId, ResourceId};
use vista_infra::jobs::{Job, JobStatus};
use vista_infra::ledger::UsageSummary;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default)]
    pub target_id: Option<ResourceId>,
    #[serde(default)]
    pub sub_target_id: Option<ResourceId>,
    #[serde(default = "empty_object")]
    pub input: JsonValue,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(Default::default())
}

/// Raw list filters; parsed in the handler so bad values get a JSON error.
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub target_id: Option<String>,
    pub limit: Option<usize>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub provider: String,
    pub owner_id: OwnerId,
    pub target_id: Option<ResourceId>,
    pub sub_target_id: Option<ResourceId>,
    pub status: JobStatus,
    pub input: JsonValue,
    pub output: Option<JsonValue>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub credits_charged: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            provider: job.provider,
            owner_id: job.owner_id,
            target_id: job.target_id,
            sub_target_id: job.sub_target_id,
            status: job.status,
            input: job.input,
            output: job.output,
            error: job.error,
            duration_ms: job.duration_ms,
            credits_charged: job.credits_charged,
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
}

/// `limit` and `remaining` are null for unlimited plans.
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub used: i64,
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    pub unlimited: bool,
}

impl From<UsageSummary> for UsageResponse {
    fn from(usage: UsageSummary) -> Self {
        let (limit, remaining) = if usage.unlimited {
            (None, None)
        } else {
            (Some(usage.limit), Some(usage.remaining))
        };
        Self {
            used: usage.used,
            limit,
            remaining,
            unlimited: usage.unlimited,
        }
    }
}
