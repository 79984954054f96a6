use std::sync::Arc;

use jobrunner_infra::jobs::{
    JobDashboard, JobEngine, Launcher, ProcessLauncher, TaskLauncher, TracingRunLog,
    builtin_registry,
};
use jobrunner_infra::{LaunchMode, RunnerConfig, SharedJobStore};

/// Everything the HTTP handlers need, shared behind an `Arc`.
pub struct AppServices {
    store: SharedJobStore,
    dashboard: JobDashboard<SharedJobStore>,
}

impl AppServices {
    pub fn new(store: SharedJobStore, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            dashboard: JobDashboard::new(store.clone(), launcher),
            store,
        }
    }

    pub fn store(&self) -> &SharedJobStore {
        &self.store
    }

    pub fn dashboard(&self) -> &JobDashboard<SharedJobStore> {
        &self.dashboard
    }
}

/// Wire the store and the launcher selected by `config`.
pub async fn build_services(config: &RunnerConfig) -> anyhow::Result<AppServices> {
    let store = jobrunner_infra::open_store(config).await?;

    let launcher: Arc<dyn Launcher> = match config.launch_mode {
        LaunchMode::Process => {
            tracing::info!(program = %config.runner_bin.display(), "retries launch as processes");
            Arc::new(ProcessLauncher::new(config.runner_bin.clone()))
        }
        LaunchMode::Inline => {
            tracing::info!("retries launch as in-process tasks");
            let engine = JobEngine::new(
                store.clone(),
                Arc::new(builtin_registry()),
                Arc::new(config.allowed_jobs.clone()),
                Arc::new(TracingRunLog),
            );
            Arc::new(TaskLauncher::new(Arc::new(engine)))
        }
    };

    Ok(AppServices::new(store, launcher))
}
