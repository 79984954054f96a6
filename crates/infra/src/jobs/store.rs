//! Job record storage abstraction and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use jobrunner_core::{JobId, JobPatch, JobQuery, JobRecord, JobStatus, NewJobRecord, Page};

/// Job record store abstraction.
///
/// Every write is atomic per call; there is no cross-call locking. Two writers
/// touching the same column of the same record resolve as last-write-wins.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record; the store assigns the id and timestamps.
    async fn create(&self, new: NewJobRecord) -> Result<JobRecord, JobStoreError>;

    /// Get a record by id.
    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, JobStoreError>;

    /// Apply a partial update and return the updated record.
    async fn update(&self, id: JobId, patch: JobPatch) -> Result<JobRecord, JobStoreError>;

    /// Apply `patch` only if the record currently has status `expected`.
    ///
    /// Returns `None` when the record does not exist or is in another status.
    async fn transition(
        &self,
        id: JobId,
        expected: JobStatus,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, JobStoreError>;

    /// List records matching the query, in dashboard order.
    async fn list(&self, query: &JobQuery) -> Result<Page<JobRecord>, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("corrupt job record {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    jobs: BTreeMap<JobId, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Snapshot of every record, in id order.
    pub fn all(&self) -> Vec<JobRecord> {
        self.read().jobs.values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, new: NewJobRecord) -> Result<JobRecord, JobStoreError> {
        let mut inner = self.write();
        inner.next_id += 1;
        let id = JobId::new(inner.next_id);
        let record = JobRecord::from_new(id, new, Utc::now());
        inner.jobs.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, JobStoreError> {
        Ok(self.read().jobs.get(&id).cloned())
    }

    async fn update(&self, id: JobId, patch: JobPatch) -> Result<JobRecord, JobStoreError> {
        let mut inner = self.write();
        let record = inner.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        record.apply(&patch, Utc::now());
        Ok(record.clone())
    }

    async fn transition(
        &self,
        id: JobId,
        expected: JobStatus,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, JobStoreError> {
        let mut inner = self.write();
        match inner.jobs.get_mut(&id) {
            Some(record) if record.status == expected => {
                record.apply(&patch, Utc::now());
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list(&self, query: &JobQuery) -> Result<Page<JobRecord>, JobStoreError> {
        let inner = self.read();
        let mut matching: Vec<JobRecord> = inner
            .jobs
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        JobQuery::sort(&mut matching);

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .collect();
        Ok(Page::new(items, total, query))
    }
}

#[async_trait::async_trait]
impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    async fn create(&self, new: NewJobRecord) -> Result<JobRecord, JobStoreError> {
        (**self).create(new).await
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, JobStoreError> {
        (**self).get(id).await
    }

    async fn update(&self, id: JobId, patch: JobPatch) -> Result<JobRecord, JobStoreError> {
        (**self).update(id, patch).await
    }

    async fn transition(
        &self,
        id: JobId,
        expected: JobStatus,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, JobStoreError> {
        (**self).transition(id, expected, patch).await
    }

    async fn list(&self, query: &JobQuery) -> Result<Page<JobRecord>, JobStoreError> {
        (**self).list(query).await
    }
}
