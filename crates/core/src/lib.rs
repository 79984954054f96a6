//! `jobrunner-core` — job model and the rules that govern it.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the persisted job record shape, its status machine, the allow-list gate and
//! the error kinds produced while executing a job.

pub mod allow_list;
pub mod error;
pub mod id;
pub mod job;
pub mod query;

pub use allow_list::AllowList;
pub use error::{DomainError, DomainResult, JobError};
pub use id::JobId;
pub use job::{
    CANCELED_MESSAGE, JobPatch, JobRecord, JobStatus, MAX_RETRIES, NewJobRecord, Target,
};
pub use query::{JobQuery, PAGE_SIZE, Page};
