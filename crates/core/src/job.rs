//! Job record model and its status machine.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, JobError};
use crate::id::JobId;

/// Upper bound on execution attempts within one run.
pub const MAX_RETRIES: u32 = 3;

/// Error message written by a manual cancel from the dashboard.
pub const CANCELED_MESSAGE: &str = "Job was manually canceled.";

/// The operation a job invokes: a qualified class name plus a method on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub class: String,
    pub method: String,
}

impl Target {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }
}

impl core::fmt::Display for Target {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.class, self.method)
    }
}

/// Lifecycle status of a job record.
///
/// There is no queued state: a record is created already `Running` (or
/// `Failed`, when the allow-list rejects it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 3] = [JobStatus::Running, JobStatus::Completed, JobStatus::Failed];

    /// Persisted / query-string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::invalid_status(other)),
        }
    }
}

/// A persisted job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub target: Target,
    /// Positional arguments, in declared order.
    pub params: Vec<Value>,
    /// Stored and displayed only; never affects execution order.
    pub priority: i32,
    pub status: JobStatus,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Build a record from an insert payload (stores call this on create).
    pub fn from_new(id: JobId, new: NewJobRecord, now: DateTime<Utc>) -> Self {
        Self {
            id,
            target: new.target,
            params: new.params,
            priority: new.priority,
            status: new.status,
            attempts: new.attempts,
            error_message: new.error_message,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, bumping `updated_at`.
    pub fn apply(&mut self, patch: &JobPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(attempts) = patch.attempts {
            self.attempts = attempts;
        }
        if let Some(error_message) = &patch.error_message {
            self.error_message = error_message.clone();
        }
        self.updated_at = now;
    }

    /// Cancel is only permitted while the record is running.
    pub fn can_cancel(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Retry is only permitted once the record has failed.
    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// Whether the dashboard offers a retry button for this record.
    ///
    /// Narrower than `can_retry`: only manually canceled failures or failures
    /// without a message get the button.
    pub fn offers_retry(&self) -> bool {
        self.can_retry()
            && self
                .error_message
                .as_deref()
                .is_none_or(|m| m.is_empty() || m == CANCELED_MESSAGE)
    }
}

/// Insert payload for a new job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJobRecord {
    pub target: Target,
    pub params: Vec<Value>,
    pub priority: i32,
    pub status: JobStatus,
    pub attempts: u32,
    pub error_message: Option<String>,
}

impl NewJobRecord {
    /// A record at the start of a run: running, no attempts yet.
    pub fn running(target: Target, params: Vec<Value>, priority: i32) -> Self {
        Self {
            target,
            params,
            priority,
            status: JobStatus::Running,
            attempts: 0,
            error_message: None,
        }
    }

    /// A record for a target the allow-list rejected: failed on its single
    /// (never executed) attempt.
    pub fn rejected(target: Target, params: Vec<Value>, priority: i32) -> Self {
        let error = JobError::unauthorized(target.class.clone());
        Self {
            target,
            params,
            priority,
            status: JobStatus::Failed,
            attempts: 1,
            error_message: Some(error.to_string()),
        }
    }
}

/// Partial update of a job record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub attempts: Option<u32>,
    /// `Some(None)` clears the message.
    pub error_message: Option<Option<String>>,
}

impl JobPatch {
    /// Record the attempt counter.
    pub fn attempts(attempts: u32) -> Self {
        Self {
            attempts: Some(attempts),
            ..Default::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(JobStatus::Completed),
            error_message: Some(None),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(Some(message.into())),
            ..Default::default()
        }
    }

    /// Failed with an explicit attempt count (allow-list rejection on resume).
    pub fn failed_after(attempts: u32, message: impl Into<String>) -> Self {
        Self {
            attempts: Some(attempts),
            ..Self::failed(message)
        }
    }

    pub fn canceled() -> Self {
        Self::failed(CANCELED_MESSAGE)
    }

    /// Back to running with a clean slate, as a user retry requires.
    pub fn reset_for_retry() -> Self {
        Self {
            status: Some(JobStatus::Running),
            attempts: Some(0),
            error_message: Some(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.attempts.is_none() && self.error_message.is_none()
    }
}
