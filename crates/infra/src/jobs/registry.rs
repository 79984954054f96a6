//! Job registry: qualified class names mapped to invocable jobs.
//!
//! This is how a string target becomes code. It is populated once at process
//! startup; resolving a target is a plain map lookup followed by a method
//! check on the registered job.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use jobrunner_core::{JobError, Target};

/// Something the engine can invoke by method name.
pub trait Job: Send + Sync {
    /// Whether `method` exists on this job.
    fn has_method(&self, method: &str) -> bool;

    /// Invoke `method` with positional `params`.
    ///
    /// Only called for methods where `has_method` returned `true`.
    fn invoke(&self, method: &str, params: &[Value]) -> anyhow::Result<()>;
}

/// Single-method job backed by a closure.
pub struct FnJob<F> {
    method: String,
    f: F,
}

impl<F> FnJob<F>
where
    F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(method: impl Into<String>, f: F) -> Self {
        Self {
            method: method.into(),
            f,
        }
    }
}

impl<F> Job for FnJob<F>
where
    F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync,
{
    fn has_method(&self, method: &str) -> bool {
        self.method == method
    }

    fn invoke(&self, _method: &str, params: &[Value]) -> anyhow::Result<()> {
        (self.f)(params)
    }
}

/// Registry of jobs keyed by qualified class name.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Arc<dyn Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job under a qualified class name (replaces any previous one).
    pub fn register(&mut self, class: impl Into<String>, job: impl Job + 'static) -> &mut Self {
        self.jobs.insert(class.into(), Arc::new(job));
        self
    }

    /// Register a single-method closure job.
    pub fn register_fn<F>(
        &mut self,
        class: impl Into<String>,
        method: impl Into<String>,
        f: F,
    ) -> &mut Self
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(class, FnJob::new(method, f))
    }

    /// Resolve a target to its job, checking the class first, then the method.
    pub fn resolve(&self, target: &Target) -> Result<Arc<dyn Job>, JobError> {
        let job = self
            .jobs
            .get(&target.class)
            .ok_or_else(|| JobError::TargetNotFound {
                class: target.class.clone(),
            })?;

        if !job.has_method(&target.method) {
            return Err(JobError::MethodNotFound {
                class: target.class.clone(),
                method: target.method.clone(),
            });
        }

        Ok(job.clone())
    }

    fn classes(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut classes: Vec<_> = self.classes().collect();
        classes.sort_unstable();
        f.debug_struct("JobRegistry").field("classes", &classes).finish()
    }
}
