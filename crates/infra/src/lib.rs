//! Infrastructure layer: record stores, job engine, launchers, config.

use std::sync::Arc;

pub mod config;
pub mod jobs;

pub use config::{ConfigError, LaunchMode, LogFormat, RunnerConfig, StoreKind};

/// Shared, type-erased job store.
pub type SharedJobStore = Arc<dyn jobs::JobStore>;

/// Open the store selected by `config`.
pub async fn open_store(config: &RunnerConfig) -> Result<SharedJobStore, jobs::JobStoreError> {
    let store: SharedJobStore = match config.store {
        StoreKind::Sqlite => Arc::new(jobs::SqliteJobStore::connect(&config.database_url).await?),
        StoreKind::Memory => jobs::InMemoryJobStore::arc(),
    };
    tracing::info!(store = ?config.store, "job store opened");
    Ok(store)
}
