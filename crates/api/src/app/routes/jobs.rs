use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect},
};

use jobrunner_core::JobId;
use jobrunner_infra::jobs::{ActionOutcome, DashboardError};

use crate::app::dto::{ActionForm, Flash, JobPageView, JobView, ListJobsQuery};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::csrf;
use crate::html::{IndexPage, render_index};

pub async fn index(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Query(params): Query<ListJobsQuery>,
) -> axum::response::Response {
    let query = match params.to_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    let page = match services.dashboard().list(&query).await {
        Ok(p) => p,
        Err(e) => return errors::dashboard_error_to_response(e),
    };

    let (token, set_cookie) = csrf::issue(&headers);
    let body = render_index(&IndexPage {
        page: &page,
        query: &query,
        flash: params.flash(),
        csrf_token: &token,
    });

    let mut response = Html(body).into_response();
    if let Some(cookie) = set_cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

pub async fn cancel(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    form: Option<Form<ActionForm>>,
) -> axum::response::Response {
    let id = match authorize_action(&headers, &id, form.as_ref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let flash = match services.dashboard().cancel(id).await {
        Ok(ActionOutcome::Applied(_)) => Flash::Canceled,
        Ok(ActionOutcome::Rejected) => Flash::CancelRejected,
        Err(e) => return errors::dashboard_error_to_response(e),
    };
    Redirect::to(&flash.location()).into_response()
}

pub async fn retry(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    form: Option<Form<ActionForm>>,
) -> axum::response::Response {
    let id = match authorize_action(&headers, &id, form.as_ref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let flash = match services.dashboard().retry(id).await {
        Ok(ActionOutcome::Applied(_)) => Flash::Retried,
        Ok(ActionOutcome::Rejected) => Flash::RetryRejected,
        Err(DashboardError::Launch { .. }) => Flash::RetryLaunchFailed,
        Err(e) => return errors::dashboard_error_to_response(e),
    };
    Redirect::to(&flash.location()).into_response()
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<ListJobsQuery>,
) -> axum::response::Response {
    let query = match params.to_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    match services.dashboard().list(&query).await {
        Ok(page) => (StatusCode::OK, Json(JobPageView::from(page))).into_response(),
        Err(e) => errors::dashboard_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.dashboard().get(id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(JobView::from(record))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "job not found"),
        Err(e) => errors::dashboard_error_to_response(e),
    }
}

/// CSRF check first, then the path id.
fn authorize_action(
    headers: &HeaderMap,
    id: &str,
    form: Option<&Form<ActionForm>>,
) -> Result<JobId, axum::response::Response> {
    let submitted = form.and_then(|Form(f)| f.token.as_deref());
    if let Err(status) = csrf::verify(headers, submitted) {
        tracing::warn!(job_id = %id, "dashboard action rejected: bad csrf token");
        return Err(errors::json_error(
            status,
            "csrf_mismatch",
            "missing or invalid CSRF token",
        ));
    }
    parse_id(id)
}

fn parse_id(id: &str) -> Result<JobId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"))
}
