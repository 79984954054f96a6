//! Dashboard façade: list, inspect, cancel and retry job records.

use std::sync::Arc;

use tracing::{info, warn};

use jobrunner_core::{JobId, JobPatch, JobQuery, JobRecord, JobStatus, Page};

use super::launcher::{LaunchError, LaunchRequest, Launcher};
use super::store::{JobStore, JobStoreError};

/// Result of a dashboard command.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The transition happened; carries the updated record.
    Applied(JobRecord),
    /// The record is missing or in the wrong status; nothing changed.
    Rejected,
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error("retry of job {id} could not be launched: {source}")]
    Launch {
        id: JobId,
        #[source]
        source: LaunchError,
    },
}

/// Operator-facing view over the record store.
pub struct JobDashboard<S> {
    store: S,
    launcher: Arc<dyn Launcher>,
}

impl<S: Clone> Clone for JobDashboard<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            launcher: self.launcher.clone(),
        }
    }
}

impl<S: JobStore> JobDashboard<S> {
    pub fn new(store: S, launcher: Arc<dyn Launcher>) -> Self {
        Self { store, launcher }
    }

    pub async fn list(&self, query: &JobQuery) -> Result<Page<JobRecord>, DashboardError> {
        Ok(self.store.list(query).await?)
    }

    pub async fn get(&self, id: JobId) -> Result<Option<JobRecord>, DashboardError> {
        Ok(self.store.get(id).await?)
    }

    /// Mark a running record as manually canceled.
    ///
    /// Only the stored status changes; a run already in progress keeps going.
    pub async fn cancel(&self, id: JobId) -> Result<ActionOutcome, DashboardError> {
        match self
            .store
            .transition(id, JobStatus::Running, JobPatch::canceled())
            .await?
        {
            Some(record) => {
                info!(job_id = %id, "job canceled");
                Ok(ActionOutcome::Applied(record))
            }
            None => {
                warn!(job_id = %id, "cancel rejected: job missing or not running");
                Ok(ActionOutcome::Rejected)
            }
        }
    }

    /// Reset a failed record and launch a fresh run of it.
    pub async fn retry(&self, id: JobId) -> Result<ActionOutcome, DashboardError> {
        let Some(record) = self
            .store
            .transition(id, JobStatus::Failed, JobPatch::reset_for_retry())
            .await?
        else {
            warn!(job_id = %id, "retry rejected: job missing or not failed");
            return Ok(ActionOutcome::Rejected);
        };

        let request = LaunchRequest::new(record.target.clone(), record.params.clone())
            .with_priority(record.priority)
            .resuming(id);

        if let Err(source) = self.launcher.launch(&request) {
            warn!(job_id = %id, error = %source, "retry launch failed");
            self.store
                .update(
                    id,
                    JobPatch::failed(format!("Retry could not be launched: {source}")),
                )
                .await?;
            return Err(DashboardError::Launch { id, source });
        }

        info!(job_id = %id, job = %record.target, "job retry launched");
        Ok(ActionOutcome::Applied(record))
    }
}
