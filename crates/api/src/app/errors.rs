use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use jobrunner_infra::jobs::{DashboardError, JobStoreError};

pub fn dashboard_error_to_response(err: DashboardError) -> axum::response::Response {
    match err {
        DashboardError::Store(e) => store_error_to_response(e),
        DashboardError::Launch { id, source } => json_error(
            StatusCode::BAD_GATEWAY,
            "launch_error",
            format!("retry of job {id} could not be launched: {source}"),
        ),
    }
}

pub fn store_error_to_response(err: JobStoreError) -> axum::response::Response {
    match err {
        JobStoreError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("job {id} not found"))
        }
        JobStoreError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
        e @ JobStoreError::Corrupt { .. } => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "corrupt_record",
            e.to_string(),
        ),
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
