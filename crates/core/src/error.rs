//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures of input parsing. Job execution failures are `JobError`; infrastructure concerns
/// belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A status string did not name a known job status.
    #[error("invalid status: {0}")]
    InvalidStatus(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_status(msg: impl Into<String>) -> Self {
        Self::InvalidStatus(msg.into())
    }
}

/// Why a job run (or a single attempt of it) failed.
///
/// The `Display` text of each variant is exactly what ends up in a record's
/// `error_message` and in user-facing output.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The class is not on the allow-list. Terminal; never retried.
    #[error("Unauthorized class: {class}")]
    UnauthorizedTarget { class: String },

    /// No job is registered under the class name. Retryable.
    #[error("Class {class} not found")]
    TargetNotFound { class: String },

    /// The registered job has no such method. Retryable.
    #[error("Method {method} not found in {class}")]
    MethodNotFound { class: String, method: String },

    /// The invocation itself returned an error (or panicked). Retryable.
    #[error("{0}")]
    Invocation(String),

    /// Every attempt failed. Terminal; carries the last attempt's message.
    #[error("{last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl JobError {
    pub fn unauthorized(class: impl Into<String>) -> Self {
        Self::UnauthorizedTarget {
            class: class.into(),
        }
    }

    pub fn invocation(msg: impl Into<String>) -> Self {
        Self::Invocation(msg.into())
    }

    /// Whether another attempt may follow this error inside a run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobError::TargetNotFound { .. }
                | JobError::MethodNotFound { .. }
                | JobError::Invocation(_)
        )
    }

    /// Short machine-readable name of the error kind (used as a log field).
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::UnauthorizedTarget { .. } => "unauthorized_target",
            JobError::TargetNotFound { .. } => "target_not_found",
            JobError::MethodNotFound { .. } => "method_not_found",
            JobError::Invocation(_) => "invocation_error",
            JobError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}
