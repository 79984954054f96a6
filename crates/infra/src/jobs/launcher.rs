//! Launch trigger: fire-and-forget submission of a run.
//!
//! A successful `launch` means "accepted for execution", nothing more. There
//! is no result channel; the outcome shows up later in the record store.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{error, info};

use jobrunner_core::{JobId, Target};

use super::engine::{JobEngine, RunRequest};
use super::store::JobStore;

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// What to launch.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub target: Target,
    pub params: Vec<Value>,
    pub priority: i32,
    pub delay_secs: i64,
    /// Resume this existing record instead of creating a new one.
    pub job_id: Option<JobId>,
}

impl LaunchRequest {
    pub fn new(target: Target, params: Vec<Value>) -> Self {
        Self {
            target,
            params,
            priority: 1,
            delay_secs: 0,
            job_id: None,
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

    pub fn resuming(mut self, id: JobId) -> Self {
        self.job_id = Some(id);
        self
    }

    fn run_request(&self) -> RunRequest {
        RunRequest::new(self.target.clone(), self.params.clone())
            .with_priority(self.priority)
            .with_delay(self.delay_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to encode params: {0}")]
    Params(#[from] serde_json::Error),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no async runtime available to launch the job")]
    NoRuntime,
    #[error("launcher unavailable: {0}")]
    Unavailable(String),
}

/// Starts runs without waiting for them.
pub trait Launcher: Send + Sync + 'static {
    fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError>;
}

impl<L: Launcher + ?Sized> Launcher for Arc<L> {
    fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        (**self).launch(request)
    }
}

/// Launches each run as a detached `jobrunner run ...` process.
///
/// Must be called from inside a tokio runtime; the child is never awaited and
/// is reaped by tokio in the background. The child gets its own process group
/// on unix and runs without a console on windows.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for the entry point.
    pub fn build_args(request: &LaunchRequest) -> Result<Vec<String>, LaunchError> {
        let mut args = vec![
            "run".to_string(),
            request.target.class.clone(),
            request.target.method.clone(),
            "--params".to_string(),
            serde_json::to_string(&request.params)?,
            "--priority".to_string(),
            request.priority.to_string(),
            "--delay".to_string(),
            request.delay_secs.to_string(),
        ];
        if let Some(id) = request.job_id {
            args.push("--job-id".to_string());
            args.push(id.to_string());
        }
        Ok(args)
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(LaunchError::NoRuntime);
        }

        let args = Self::build_args(request)?;
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        command.process_group(0);
        #[cfg(windows)]
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);

        let child = command.spawn().map_err(|source| {
            error!(
                program = %self.program.display(),
                job = %request.target,
                error = %source,
                "failed to spawn job process"
            );
            LaunchError::Spawn {
                program: self.program.display().to_string(),
                source,
            }
        })?;

        info!(
            pid = child.id(),
            job = %request.target,
            job_id = request.job_id.map(|id| id.get()),
            "job process launched"
        );
        Ok(())
    }
}

/// Launches each run as a detached tokio task on an in-process engine.
pub struct TaskLauncher<S> {
    engine: Arc<JobEngine<S>>,
}

impl<S> TaskLauncher<S> {
    pub fn new(engine: Arc<JobEngine<S>>) -> Self {
        Self { engine }
    }
}

impl<S> Launcher for TaskLauncher<S>
where
    S: JobStore + 'static,
{
    fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| LaunchError::NoRuntime)?;
        let engine = self.engine.clone();
        let run = request.run_request();
        let job_id = request.job_id;

        handle.spawn(async move {
            let outcome = match job_id {
                Some(id) => engine.resume(id, run.delay_secs).await,
                None => engine.execute(run).await,
            };
            if let Err(err) = outcome {
                error!(target: "background_jobs_errors", error = %err, "launched job run failed");
            }
        });
        Ok(())
    }
}

/// Records launch requests instead of running them (tests/dev).
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    requests: Mutex<Vec<LaunchRequest>>,
    failure: Option<String>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose every launch fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            requests: Mutex::default(),
            failure: Some(reason.into()),
        }
    }

    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        if let Some(reason) = &self.failure {
            return Err(LaunchError::Unavailable(reason.clone()));
        }
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        Ok(())
    }
}
