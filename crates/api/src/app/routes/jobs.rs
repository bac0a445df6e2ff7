use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use vista_core::{JobId, JobType, ResourceId};
use vista_infra::SubmitJob;
use vista_infra::jobs::{Job, JobFilter, JobStatus, JobTargets};

use crate::app::dto::{JobListResponse, JobResponse, ListJobsQuery, SubmitJobRequest};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_job).get(list_jobs))
        .route("/stats", get(job_stats))
        .route("/:id", get(get_job))
        .route("/:id/retry", post(retry_job))
}

pub async fn submit_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text());
        }
    };

    let request = SubmitJob {
        owner_id: owner.owner_id(),
        job_type: body.job_type,
        targets: JobTargets {
            target_id: body.target_id,
            sub_target_id: body.sub_target_id,
        },
        input: body.input,
    };

    match services.jobs.submit_job(request).await {
        Ok(job) => (StatusCode::CREATED, Json(JobResponse::from(job))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<ListJobsQuery>,
) -> axum::response::Response {
    let filter = match parse_filter(&owner, query) {
        Ok(filter) => filter,
        Err(resp) => return resp,
    };

    match services.jobs.list_jobs(filter).await {
        Ok(jobs) => Json(JobListResponse {
            jobs: jobs.into_iter().map(JobResponse::from).collect(),
        })
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn job_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
) -> axum::response::Response {
    match services.jobs.job_stats(owner.owner_id()).await {
        Ok(stats) => Json(serde_json::json!({
            "pending": stats.pending,
            "processing": stats.processing,
            "completed": stats.completed,
            "failed": stats.failed,
            "total": stats.total(),
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match owned_job(&services, &owner, &id).await {
        Ok(job) => Json(JobResponse::from(job)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn retry_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job = match owned_job(&services, &owner, &id).await {
        Ok(job) => job,
        Err(resp) => return resp,
    };

    match services.jobs.retry_job(job.id).await {
        Ok(job) => (StatusCode::ACCEPTED, Json(JobResponse::from(job))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Load a job visible to `owner`. Other owners' jobs are reported as missing.
async fn owned_job(
    services: &AppServices,
    owner: &OwnerContext,
    id: &str,
) -> Result<Job, axum::response::Response> {
    let job_id: JobId = id
        .parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"))?;

    let job = services
        .jobs
        .get_job(job_id)
        .await
        .map_err(errors::service_error_to_response)?;

    if job.owner_id != owner.owner_id() {
        return Err(errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("job not found: {job_id}"),
        ));
    }

    Ok(job)
}

fn parse_filter(owner: &OwnerContext, query: ListJobsQuery) -> Result<JobFilter, axum::response::Response> {
    let job_type = query
        .job_type
        .as_deref()
        .map(str::parse::<JobType>)
        .transpose()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))?;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))?;

    let target_id = query
        .target_id
        .as_deref()
        .map(str::parse::<ResourceId>)
        .transpose()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid target id"))?;

    Ok(JobFilter {
        owner_id: Some(owner.owner_id()),
        job_type,
        status,
        target_id,
        limit: query.limit.unwrap_or(JobFilter::DEFAULT_LIMIT),
    })
}
