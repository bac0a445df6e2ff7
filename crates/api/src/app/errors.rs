use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use vista_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::AdmissionRejected { .. } => {
            json_error(StatusCode::PAYMENT_REQUIRED, "quota_exceeded", err.to_string())
        }
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        ServiceError::InvalidState { .. } => {
            json_error(StatusCode::CONFLICT, "invalid_state", err.to_string())
        }
        ServiceError::Infrastructure(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
