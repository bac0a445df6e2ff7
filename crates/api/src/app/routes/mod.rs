use axum::{Router, routing::get};

pub mod jobs;
pub mod system;
pub mod usage;

/// Router for all owner-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/jobs", jobs::router())
        .route("/usage", get(usage::get_usage))
}
