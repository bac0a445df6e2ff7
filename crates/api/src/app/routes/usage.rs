use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use crate::app::dto::UsageResponse;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::OwnerContext;

pub async fn get_usage(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
) -> axum::response::Response {
    match services.jobs.get_usage(owner.owner_id()).await {
        Ok(usage) => Json(UsageResponse::from(usage)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
