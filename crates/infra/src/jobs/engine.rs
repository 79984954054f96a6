//! Job engine: gate, create, optional delay, bounded retry loop.
//!
//! One engine call is one sequential run. Attempts never overlap, there is no
//! backoff between them, and nothing interrupts a run once it started (a
//! dashboard cancel only changes the stored status).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use jobrunner_core::{
    AllowList, JobError, JobId, JobPatch, JobRecord, JobStatus, MAX_RETRIES, NewJobRecord, Target,
};

use super::registry::JobRegistry;
use super::run_log::{RunEvent, RunLog};
use super::store::{JobStore, JobStoreError};

/// One request to run a job.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub target: Target,
    /// Positional arguments, in declared order.
    pub params: Vec<Value>,
    pub priority: i32,
    /// Seconds to wait before the first attempt; `<= 0` means no wait.
    pub delay_secs: i64,
}

impl RunRequest {
    pub fn new(target: Target, params: Vec<Value>) -> Self {
        Self {
            target,
            params,
            priority: 1,
            delay_secs: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay(mut self, delay_secs: i64) -> Self {
        self.delay_secs = delay_secs;
        self
    }
}

/// Infrastructure failure of a run. Job failures are not errors here; they
/// end up in the returned record.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {id} cannot be resumed from status {status} with attempts recorded")]
    NotResumable { id: JobId, status: JobStatus },
}

/// Runs jobs against a store, a registry and an allow-list.
pub struct JobEngine<S> {
    store: S,
    registry: Arc<JobRegistry>,
    allow_list: Arc<AllowList>,
    log: Arc<dyn RunLog>,
}

impl<S: Clone> Clone for JobEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
            allow_list: self.allow_list.clone(),
            log: self.log.clone(),
        }
    }
}

impl<S: JobStore> JobEngine<S> {
    pub fn new(
        store: S,
        registry: Arc<JobRegistry>,
        allow_list: Arc<AllowList>,
        log: Arc<dyn RunLog>,
    ) -> Self {
        Self {
            store,
            registry,
            allow_list,
            log,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Entry point: check the gate, then run.
    ///
    /// A rejected target is persisted directly as failed on its single attempt
    /// and never resolved or invoked.
    pub async fn execute(&self, request: RunRequest) -> Result<JobRecord, EngineError> {
        if !self.allow_list.is_permitted(&request.target.class) {
            let record = self
                .store
                .create(NewJobRecord::rejected(
                    request.target.clone(),
                    request.params,
                    request.priority,
                ))
                .await?;
            self.reject(&record);
            return Ok(record);
        }

        self.run(request).await
    }

    /// Create a running record and drive it to a terminal status.
    ///
    /// Callers are expected to have checked the gate (`execute` does).
    pub async fn run(&self, request: RunRequest) -> Result<JobRecord, EngineError> {
        let record = self
            .store
            .create(NewJobRecord::running(
                request.target,
                request.params,
                request.priority,
            ))
            .await?;
        debug!(target: "background_jobs", job_id = %record.id, job = %record.target, "job record created");

        self.drive(record, request.delay_secs).await
    }

    /// Re-enter the loop for an existing record that was reset for retry.
    pub async fn resume(&self, id: JobId, delay_secs: i64) -> Result<JobRecord, EngineError> {
        let record = self.store.get(id).await?.ok_or(EngineError::NotFound(id))?;
        if record.status != JobStatus::Running || record.attempts != 0 {
            return Err(EngineError::NotResumable {
                id,
                status: record.status,
            });
        }

        if !self.allow_list.is_permitted(&record.target.class) {
            let error = JobError::unauthorized(record.target.class.clone());
            let record = self
                .store
                .update(id, JobPatch::failed_after(1, error.to_string()))
                .await?;
            self.reject(&record);
            return Ok(record);
        }

        self.drive(record, delay_secs).await
    }

    async fn drive(&self, record: JobRecord, delay_secs: i64) -> Result<JobRecord, EngineError> {
        if delay_secs > 0 {
            let seconds = delay_secs.unsigned_abs();
            self.log.record(&RunEvent::Delaying {
                job_id: record.id,
                seconds,
            });
            tokio::time::sleep(Duration::from_secs(seconds)).await;
        }

        let mut last_error = None;
        for attempt in 1..=MAX_RETRIES {
            self.store.update(record.id, JobPatch::attempts(attempt)).await?;

            match self.attempt(&record).await {
                Ok(()) => {
                    let done = self.store.update(record.id, JobPatch::completed()).await?;
                    self.log.record(&RunEvent::Succeeded {
                        job_id: done.id,
                        target: done.target.clone(),
                        priority: done.priority,
                        attempt,
                    });
                    return Ok(done);
                }
                Err(error) => {
                    self.log.record(&RunEvent::AttemptFailed {
                        job_id: record.id,
                        target: record.target.clone(),
                        priority: record.priority,
                        attempt,
                        error: error.clone(),
                    });
                    last_error = Some(error);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_default();
        let failed = self
            .store
            .update(record.id, JobPatch::failed(last_error.clone()))
            .await?;
        self.log.record(&RunEvent::Exhausted {
            job_id: failed.id,
            target: failed.target.clone(),
            priority: failed.priority,
            error: JobError::RetriesExhausted {
                attempts: MAX_RETRIES,
                last_error,
            },
        });
        Ok(failed)
    }

    /// Resolve and invoke once. Panics inside the job count as a failed
    /// attempt.
    async fn attempt(&self, record: &JobRecord) -> Result<(), JobError> {
        let job = self.registry.resolve(&record.target)?;
        let method = record.target.method.clone();
        let params = record.params.clone();

        match tokio::task::spawn_blocking(move || job.invoke(&method, &params)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(JobError::invocation(format!("{err:#}"))),
            Err(join) if join.is_panic() => {
                let payload = join.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "job panicked".to_string());
                warn!(target: "background_jobs_errors", job_id = %record.id, %message, "job panicked");
                Err(JobError::invocation(message))
            }
            Err(join) => Err(JobError::invocation(join.to_string())),
        }
    }

    fn reject(&self, record: &JobRecord) {
        self.log.record(&RunEvent::Rejected {
            job_id: record.id,
            target: record.target.clone(),
            priority: record.priority,
            error: JobError::unauthorized(record.target.class.clone()),
        });
    }
}
