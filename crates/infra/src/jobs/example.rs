//! Built-in example job and the default registry.

use serde_json::Value;
use tracing::info;

use super::registry::{Job, JobRegistry};

/// Qualified class name the example job is registered under.
pub const EXAMPLE_JOB: &str = "app::jobs::ExampleJob";

const DEFAULT_MESSAGE: &str = "Hello, Background Job!";

/// Echoes a message: `handle([message])`.
///
/// The first param is used as the message when it is a string; anything
/// else (or nothing) falls back to the default greeting.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExampleJob;

impl ExampleJob {
    pub fn message(params: &[Value]) -> String {
        match params.first() {
            Some(Value::String(s)) => s.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl Job for ExampleJob {
    fn has_method(&self, method: &str) -> bool {
        method == "handle"
    }

    fn invoke(&self, _method: &str, params: &[Value]) -> anyhow::Result<()> {
        let message = Self::message(params);
        info!(target: "background_jobs", %message, "executing ExampleJob");
        println!("Executing ExampleJob with message: {message}");
        Ok(())
    }
}

/// Registry with every job this binary ships.
pub fn builtin_registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register(EXAMPLE_JOB, ExampleJob);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    use jobrunner_core::Target;
    use serde_json::json;

    #[test]
    fn message_comes_from_first_param() {
        assert_eq!(ExampleJob::message(&[json!("hi")]), "hi");
        assert_eq!(ExampleJob::message(&[json!(5)]), "5");
        assert_eq!(ExampleJob::message(&[]), DEFAULT_MESSAGE);
        assert_eq!(ExampleJob::message(&[Value::Null]), DEFAULT_MESSAGE);
    }

    #[test]
    fn builtin_registry_resolves_example_job() {
        let registry = builtin_registry();
        let job = registry.resolve(&Target::new(EXAMPLE_JOB, "handle")).unwrap();
        assert!(job.invoke("handle", &[json!("hi")]).is_ok());
        assert!(registry.resolve(&Target::new(EXAMPLE_JOB, "run")).is_err());
    }
}
