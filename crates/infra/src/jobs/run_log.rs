//! Run log: the engine's injected outlet for attempt outcomes.
//!
//! The engine never logs through a global channel; it hands every outcome to
//! the `RunLog` it was built with.

use std::sync::Mutex;

use tracing::{error, info};

use jobrunner_core::{JobError, JobId, MAX_RETRIES, Target};

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// The run waits before its first attempt.
    Delaying { job_id: JobId, seconds: u64 },
    /// The allow-list rejected the target; nothing was attempted.
    Rejected {
        job_id: JobId,
        target: Target,
        priority: i32,
        error: JobError,
    },
    /// An attempt succeeded; the run is complete.
    Succeeded {
        job_id: JobId,
        target: Target,
        priority: i32,
        attempt: u32,
    },
    /// One attempt failed; another may follow.
    AttemptFailed {
        job_id: JobId,
        target: Target,
        priority: i32,
        attempt: u32,
        error: JobError,
    },
    /// Every attempt failed; the run is over.
    Exhausted {
        job_id: JobId,
        target: Target,
        priority: i32,
        error: JobError,
    },
}

impl RunEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            RunEvent::Delaying { job_id, .. }
            | RunEvent::Rejected { job_id, .. }
            | RunEvent::Succeeded { job_id, .. }
            | RunEvent::AttemptFailed { job_id, .. }
            | RunEvent::Exhausted { job_id, .. } => *job_id,
        }
    }

    /// Failure events go to the error channel / stderr.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            RunEvent::Rejected { .. } | RunEvent::AttemptFailed { .. } | RunEvent::Exhausted { .. }
        )
    }
}

/// Human-readable console line for the event.
impl std::fmt::Display for RunEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunEvent::Delaying { seconds, .. } => {
                write!(f, "Waiting {seconds} seconds before executing the job...")
            }
            RunEvent::Rejected { error, .. } => write!(f, "{error}"),
            RunEvent::Succeeded {
                target,
                priority,
                attempt,
                ..
            } => write!(
                f,
                "Job executed successfully with priority {priority} on attempt {attempt}: {target}"
            ),
            RunEvent::AttemptFailed {
                target,
                priority,
                attempt,
                error,
                ..
            } => write!(
                f,
                "Error on attempt {attempt} for {target} with priority {priority}: {error}"
            ),
            RunEvent::Exhausted { target, .. } => write!(
                f,
                "Job permanently failed after {MAX_RETRIES} attempts: {target}"
            ),
        }
    }
}

/// Outlet for run events.
pub trait RunLog: Send + Sync + 'static {
    fn record(&self, event: &RunEvent);
}

/// Emits run events as `tracing` events.
///
/// Successes and delays go to the `background_jobs` target, failures to
/// `background_jobs_errors`, so they can be routed separately with `RUST_LOG`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunLog;

impl RunLog for TracingRunLog {
    fn record(&self, event: &RunEvent) {
        match event {
            RunEvent::Delaying { job_id, seconds } => {
                info!(target: "background_jobs", %job_id, seconds, "delaying job")
            }
            RunEvent::Rejected {
                job_id,
                target,
                priority,
                error,
            } => error!(
                target: "background_jobs_errors",
                %job_id, class = %target.class, method = %target.method, priority,
                kind = error.kind(), error = %error,
                "job rejected by allow-list"
            ),
            RunEvent::Succeeded {
                job_id,
                target,
                priority,
                attempt,
            } => info!(
                target: "background_jobs",
                %job_id, class = %target.class, method = %target.method, priority, attempt,
                "job executed successfully"
            ),
            RunEvent::AttemptFailed {
                job_id,
                target,
                priority,
                attempt,
                error,
            } => error!(
                target: "background_jobs_errors",
                %job_id, class = %target.class, method = %target.method, priority, attempt,
                kind = error.kind(), error = %error,
                "job attempt failed"
            ),
            RunEvent::Exhausted {
                job_id,
                target,
                priority,
                error,
            } => error!(
                target: "background_jobs_errors",
                %job_id, class = %target.class, method = %target.method, priority,
                attempts = MAX_RETRIES, kind = error.kind(), error = %error,
                "job failed after all attempts"
            ),
        }
    }
}

/// Prints each event's console line (stdout for progress, stderr for
/// failures) and forwards it to `TracingRunLog`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleRunLog;

impl RunLog for ConsoleRunLog {
    fn record(&self, event: &RunEvent) {
        if event.is_error() {
            eprintln!("{event}");
        } else {
            println!("{event}");
        }
        TracingRunLog.record(event);
    }
}

/// In-memory run log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRunLog {
    inner: Mutex<Vec<RunEvent>>,
}

impl InMemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl RunLog for InMemoryRunLog {
    fn record(&self, event: &RunEvent) {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
