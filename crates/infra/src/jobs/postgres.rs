//! Postgres-backed job store.
//!
//! State changes are single conditional `UPDATE ... RETURNING` statements, so
//! two workers can never both claim, complete or reset the same job. When the
//! condition does not hold, the current row is read back to tell a missing job
//! apart from a job in the wrong state.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use async_trait::async_trait;
use vista_core::{JobId, JobType, OwnerId, ResourceId};

use super::store::{INTERRUPTED_ERROR, JobStats, JobStore, JobStoreError, RecoveredJobs};
use super::types::{Job, JobFilter, JobStatus, TransitionError};

const JOB_COLUMNS: &str = "id, job_type, provider, owner_id, target_id, sub_target_id, input, output, \
                           status, error, duration_ms, credits_charged, created_at";

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn fetch_row(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM ai_jobs WHERE id = $1"))
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;

        row.map(|r| job_from_row(&r)).transpose()
    }

    /// Explain why a conditional update touched no row.
    async fn rejected_transition(&self, job_id: JobId, to: JobStatus) -> JobStoreError {
        match self.fetch_row(job_id).await {
            Ok(Some(_)) if to == JobStatus::Processing => JobStoreError::AlreadyClaimed(job_id),
            Ok(Some(job)) => JobStoreError::InvalidTransition(TransitionError {
                job_id,
                from: job.status,
                to,
            }),
            Ok(None) => JobStoreError::NotFound(job_id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type), err)]
    async fn insert(&self, job: Job) -> Result<Job, JobStoreError> {
        let credits_charged = credits_column(job.credits_charged)?;
        sqlx::query(
            r#"
            INSERT INTO ai_jobs (
                id, job_type, provider, owner_id, target_id, sub_target_id,
                input, status, credits_charged, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.job_type.as_str())
        .bind(&job.provider)
        .bind(job.owner_id.as_uuid())
        .bind(job.target_id.map(Uuid::from))
        .bind(job.sub_target_id.map(Uuid::from))
        .bind(&job.input)
        .bind(job.status.as_str())
        .bind(credits_charged)
        .bind(job.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                JobStoreError::AlreadyExists(job.id)
            } else {
                map_sqlx_error("insert_job", e)
            }
        })?;

        Ok(job)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.fetch_row(job_id).await
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn claim(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let row = sqlx::query(&format!(
            "UPDATE ai_jobs SET status = 'processing' \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_job", e))?;

        match row {
            Some(row) => job_from_row(&row),
            None => Err(self.rejected_transition(job_id, JobStatus::Processing).await),
        }
    }

    #[instrument(skip(self, output), fields(job_id = %job_id), err)]
    async fn complete(
        &self,
        job_id: JobId,
        output: JsonValue,
        duration_ms: u64,
    ) -> Result<Job, JobStoreError> {
        let duration_ms = duration_column(duration_ms)?;
        let row = sqlx::query(&format!(
            "UPDATE ai_jobs SET status = 'completed', output = $2, error = NULL, duration_ms = $3 \
             WHERE id = $1 AND status = 'processing' \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id.as_uuid())
        .bind(&output)
        .bind(duration_ms)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("complete_job", e))?;

        match row {
            Some(row) => job_from_row(&row),
            None => Err(self.rejected_transition(job_id, JobStatus::Completed).await),
        }
    }

    #[instrument(skip(self, error), fields(job_id = %job_id), err)]
    async fn fail(&self, job_id: JobId, error: String, duration_ms: u64) -> Result<Job, JobStoreError> {
        let duration_ms = duration_column(duration_ms)?;
        let row = sqlx::query(&format!(
            "UPDATE ai_jobs SET status = 'failed', output = NULL, error = $2, duration_ms = $3 \
             WHERE id = $1 AND status = 'processing' \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id.as_uuid())
        .bind(&error)
        .bind(duration_ms)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fail_job", e))?;

        match row {
            Some(row) => job_from_row(&row),
            None => Err(self.rejected_transition(job_id, JobStatus::Failed).await),
        }
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn reset_for_retry(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let row = sqlx::query(&format!(
            "UPDATE ai_jobs SET status = 'pending', output = NULL, error = NULL, duration_ms = NULL \
             WHERE id = $1 AND status = 'failed' \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reset_job", e))?;

        match row {
            Some(row) => job_from_row(&row),
            None => Err(self.rejected_transition(job_id, JobStatus::Pending).await),
        }
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM ai_jobs \
             WHERE ($1::uuid IS NULL OR owner_id = $1) \
               AND ($2::text IS NULL OR job_type = $2) \
               AND ($3::text IS NULL OR status = $3) \
               AND ($4::uuid IS NULL OR target_id = $4 OR sub_target_id = $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5"
        ))
        .bind(filter.owner_id.map(Uuid::from))
        .bind(filter.job_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.target_id.map(Uuid::from))
        .bind(filter.limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_jobs", e))?;

        rows.iter().map(job_from_row).collect()
    }

    async fn stats(&self, owner_id: OwnerId) -> Result<JobStats, JobStoreError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM ai_jobs WHERE owner_id = $1 GROUP BY status",
        )
        .bind(owner_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("job_stats", e))?;

        let mut stats = JobStats::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(|e| map_sqlx_error("job_stats", e))?;
            let count: i64 = row.try_get("count").map_err(|e| map_sqlx_error("job_stats", e))?;
            let status = status
                .parse::<JobStatus>()
                .map_err(|e| JobStoreError::Storage(e.to_string()))?;
            stats.record(status, count.max(0) as u64);
        }
        Ok(stats)
    }

    #[instrument(skip(self), err)]
    async fn recover_interrupted(&self) -> Result<RecoveredJobs, JobStoreError> {
        let failed = sqlx::query(
            "UPDATE ai_jobs SET status = 'failed', output = NULL, error = $1, duration_ms = 0 \
             WHERE status = 'processing' \
             RETURNING id",
        )
        .bind(INTERRUPTED_ERROR)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recover_interrupted", e))?;

        let pending = sqlx::query("SELECT id FROM ai_jobs WHERE status = 'pending' ORDER BY created_at, id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("recover_interrupted", e))?;

        let ids = |rows: Vec<sqlx::postgres::PgRow>| -> Result<Vec<JobId>, JobStoreError> {
            rows.iter()
                .map(|row| {
                    row.try_get::<Uuid, _>("id")
                        .map(JobId::from_uuid)
                        .map_err(|e| map_sqlx_error("recover_interrupted", e))
                })
                .collect()
        };

        Ok(RecoveredJobs {
            failed: ids(failed)?,
            pending: ids(pending)?,
        })
    }
}

// SQLx row type

#[derive(Debug)]
struct JobRow {
    id: Uuid,
    job_type: String,
    provider: String,
    owner_id: Uuid,
    target_id: Option<Uuid>,
    sub_target_id: Option<Uuid>,
    input: JsonValue,
    output: Option<JsonValue>,
    status: String,
    error: Option<String>,
    duration_ms: Option<i64>,
    credits_charged: i32,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for JobRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            job_type: row.try_get("job_type")?,
            provider: row.try_get("provider")?,
            owner_id: row.try_get("owner_id")?,
            target_id: row.try_get("target_id")?,
            sub_target_id: row.try_get("sub_target_id")?,
            input: row.try_get("input")?,
            output: row.try_get("output")?,
            status: row.try_get("status")?,
            error: row.try_get("error")?,
            duration_ms: row.try_get("duration_ms")?,
            credits_charged: row.try_get("credits_charged")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_type = row
            .job_type
            .parse::<JobType>()
            .map_err(|e| JobStoreError::Storage(format!("bad job_type in row {}: {e}", row.id)))?;
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| JobStoreError::Storage(format!("bad status in row {}: {e}", row.id)))?;

        Ok(Job {
            id: JobId::from_uuid(row.id),
            job_type,
            provider: row.provider,
            owner_id: OwnerId::from_uuid(row.owner_id),
            target_id: row.target_id.map(ResourceId::from_uuid),
            sub_target_id: row.sub_target_id.map(ResourceId::from_uuid),
            input: row.input,
            output: row.output,
            status,
            error: row.error,
            duration_ms: row.duration_ms.map(|d| d.max(0) as u64),
            credits_charged: row.credits_charged.max(0) as u32,
            created_at: row.created_at,
        })
    }
}

fn duration_column(duration_ms: u64) -> Result<i64, JobStoreError> {
    i64::try_from(duration_ms)
        .map_err(|_| JobStoreError::Storage(format!("duration_ms out of range: {duration_ms}")))
}

fn credits_column(credits: u32) -> Result<i32, JobStoreError> {
    i32::try_from(credits).map_err(|_| JobStoreError::Storage(format!("credits_charged out of range: {credits}")))
}

fn job_from_row(row: &sqlx::postgres::PgRow) -> Result<Job, JobStoreError> {
    use sqlx::FromRow;

    let row = JobRow::from_row(row)
        .map_err(|e| JobStoreError::Storage(format!("failed to deserialize job row: {e}")))?;
    Job::try_from(row)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            JobStoreError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed during {}", operation))
        }
        other => JobStoreError::Storage(format!("{} failed: {}", operation, other)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_conversions_reject_out_of_range_values() {
        assert_eq!(duration_column(1_250), Ok(1_250));
        assert_eq!(duration_column(i64::MAX as u64), Ok(i64::MAX));
        assert!(matches!(duration_column(u64::MAX), Err(JobStoreError::Storage(_))));

        assert_eq!(credits_column(3), Ok(3));
        assert_eq!(credits_column(i32::MAX as u32), Ok(i32::MAX));
        assert!(matches!(credits_column(u32::MAX), Err(JobStoreError::Storage(_))));
    }
}
