use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use axum::http::StatusCode;

use jobrunner_core::{JobId, JobQuery, JobRecord, JobStatus, Page};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Dashboard filters, as sent by the filter form (empty means "any").
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub page: Option<String>,
    pub flash: Option<String>,
}

impl ListJobsQuery {
    pub fn to_query(&self) -> Result<JobQuery, axum::response::Response> {
        let status = match non_empty(&self.status) {
            Some(raw) => Some(raw.parse::<JobStatus>().map_err(|_| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_status",
                    "status must be one of: running, completed, failed",
                )
            })?),
            None => None,
        };

        let priority = match non_empty(&self.priority) {
            Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_priority",
                    "priority must be an integer",
                )
            })?),
            None => None,
        };

        let page = match non_empty(&self.page) {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_page",
                    "page must be a positive integer",
                )
            })?),
            None => None,
        };

        Ok(JobQuery::new(status, priority, page))
    }

    pub fn flash(&self) -> Option<Flash> {
        non_empty(&self.flash).and_then(Flash::from_key)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Body of the cancel / retry forms.
#[derive(Debug, Deserialize)]
pub struct ActionForm {
    #[serde(rename = "_token")]
    pub token: Option<String>,
}

// -------------------------
// Flash messages
// -------------------------

/// Outcome message shown once after a dashboard action redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    Canceled,
    CancelRejected,
    Retried,
    RetryRejected,
    RetryLaunchFailed,
}

impl Flash {
    pub fn key(&self) -> &'static str {
        match self {
            Flash::Canceled => "canceled",
            Flash::CancelRejected => "cancel_rejected",
            Flash::Retried => "retried",
            Flash::RetryRejected => "retry_rejected",
            Flash::RetryLaunchFailed => "retry_launch_failed",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "canceled" => Some(Flash::Canceled),
            "cancel_rejected" => Some(Flash::CancelRejected),
            "retried" => Some(Flash::Retried),
            "retry_rejected" => Some(Flash::RetryRejected),
            "retry_launch_failed" => Some(Flash::RetryLaunchFailed),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Flash::Canceled => "Job canceled successfully",
            Flash::CancelRejected => "Job could not be canceled",
            Flash::Retried => "Job reattempted successfully",
            Flash::RetryRejected => "Job could not be retried",
            Flash::RetryLaunchFailed => "Retry could not be launched",
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Flash::Canceled | Flash::Retried)
    }

    /// Redirect location carrying this flash.
    pub fn location(&self) -> String {
        format!("/?flash={}", self.key())
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub class: String,
    pub method: String,
    pub params: Vec<Value>,
    pub priority: i32,
    pub status: JobStatus,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub can_cancel: bool,
    pub can_retry: bool,
}

impl From<JobRecord> for JobView {
    fn from(record: JobRecord) -> Self {
        let can_cancel = record.can_cancel();
        let can_retry = record.can_retry();
        Self {
            id: record.id,
            class: record.target.class,
            method: record.target.method,
            params: record.params,
            priority: record.priority,
            status: record.status,
            attempts: record.attempts,
            error_message: record.error_message,
            created_at: record.created_at,
            updated_at: record.updated_at,
            can_cancel,
            can_retry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobPageView {
    pub items: Vec<JobView>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl From<Page<JobRecord>> for JobPageView {
    fn from(page: Page<JobRecord>) -> Self {
        let last_page = page.last_page();
        Self {
            items: page.items.into_iter().map(JobView::from).collect(),
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            last_page,
        }
    }
}
