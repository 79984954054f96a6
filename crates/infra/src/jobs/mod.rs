//! Background job execution.
//!
//! ## Components
//!
//! - `JobStore`: persistence for job records (in-memory or SQLite)
//! - `JobRegistry`: qualified class names mapped to invocable jobs
//! - `JobEngine`: allow-list gate plus the bounded retry loop
//! - `Launcher`: fire-and-forget submission of a run (process or task)
//! - `JobDashboard`: list, cancel and retry for operators
//! - `RunLog`: where the engine reports attempt outcomes

pub mod dashboard;
pub mod engine;
pub mod example;
pub mod launcher;
pub mod registry;
pub mod run_log;
pub mod sqlite;
pub mod store;

pub use dashboard::{ActionOutcome, DashboardError, JobDashboard};
pub use engine::{EngineError, JobEngine, RunRequest};
pub use example::{EXAMPLE_JOB, ExampleJob, builtin_registry};
pub use launcher::{
    LaunchError, LaunchRequest, Launcher, ProcessLauncher, RecordingLauncher, TaskLauncher,
};
pub use registry::{FnJob, Job, JobRegistry};
pub use run_log::{ConsoleRunLog, InMemoryRunLog, RunEvent, RunLog, TracingRunLog};
pub use sqlite::SqliteJobStore;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
