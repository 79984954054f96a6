use axum::{
    Router,
    routing::{get, post},
};

pub mod jobs;
pub mod system;

/// Router for the dashboard and the JSON job endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/", get(jobs::index))
        .route("/background-jobs/:id/cancel", post(jobs::cancel))
        .route("/background-jobs/:id/retry", post(jobs::retry))
        .route("/api/jobs", get(jobs::list_jobs))
        .route("/api/jobs/:id", get(jobs::get_job))
}
