//! Runner configuration loaded from the environment.
//!
//! | Env Var                  | Default                          |
//! |--------------------------|----------------------------------|
//! | `DATABASE_URL`           | `sqlite://jobrunner.db?mode=rwc` |
//! | `JOBRUNNER_ALLOWED_JOBS` | `app::jobs::ExampleJob`          |
//! | `JOBRUNNER_BIN`          | `jobrunner` next to this binary  |
//! | `JOBRUNNER_LAUNCH`       | `process` (`process`, `inline`)  |
//! | `JOBRUNNER_STORE`        | `sqlite` (`sqlite`, `memory`)    |
//! | `JOBRUNNER_API_ADDR`     | `0.0.0.0:8080`                   |
//! | `JOBRUNNER_LOG_FORMAT`   | `json` (`json`, `pretty`)        |
//!
//! A `.env` file in the working directory is loaded first, if present.
//!
//! `JOBRUNNER_LAUNCH` defaults to `inline` with a memory store, which a spawned
//! runner process cannot see; `JOBRUNNER_STORE=memory` with
//! `JOBRUNNER_LAUNCH=process` is rejected.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use jobrunner_core::AllowList;

use crate::jobs::EXAMPLE_JOB;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://jobrunner.db?mode=rwc";
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// How the dashboard launches retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// Detached `jobrunner run` process.
    #[default]
    Process,
    /// Detached tokio task on an in-process engine.
    Inline,
}

impl FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(LaunchMode::Process),
            "inline" => Ok(LaunchMode::Inline),
            _ => Err("expected `process` or `inline`".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Sqlite,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreKind::Sqlite),
            "memory" => Ok(StoreKind::Memory),
            _ => Err("expected `sqlite` or `memory`".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err("expected `json` or `pretty`".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub database_url: String,
    pub allowed_jobs: AllowList,
    /// Program the process launcher spawns.
    pub runner_bin: PathBuf,
    pub launch_mode: LaunchMode,
    pub store: StoreKind,
    pub api_addr: SocketAddr,
    pub log_format: LogFormat,
}

impl RunnerConfig {
    /// Load from the process environment (after `.env`, if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let allowed_jobs = get("JOBRUNNER_ALLOWED_JOBS")
            .map(|list| AllowList::parse(&list))
            .unwrap_or_else(|| AllowList::new([EXAMPLE_JOB]));
        let runner_bin = get("JOBRUNNER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(default_runner_bin);

        let store: StoreKind = parse_var(&get, "JOBRUNNER_STORE")?.unwrap_or_default();
        let launch_mode = match (parse_var(&get, "JOBRUNNER_LAUNCH")?, store) {
            (Some(LaunchMode::Process), StoreKind::Memory) => {
                return Err(ConfigError::invalid(
                    "JOBRUNNER_LAUNCH",
                    "process",
                    "a memory store requires `inline` launches",
                ));
            }
            (Some(mode), _) => mode,
            (None, StoreKind::Memory) => LaunchMode::Inline,
            (None, StoreKind::Sqlite) => LaunchMode::Process,
        };
        let log_format: LogFormat = parse_var(&get, "JOBRUNNER_LOG_FORMAT")?.unwrap_or_default();

        let api_addr_raw = get("JOBRUNNER_API_ADDR").unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let api_addr = api_addr_raw
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::invalid("JOBRUNNER_API_ADDR", &api_addr_raw, e.to_string())
            })?;

        Ok(Self {
            database_url,
            allowed_jobs,
            runner_bin,
            launch_mode,
            store,
            api_addr,
            log_format,
        })
    }
}

fn parse_var<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = String>,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|raw| T::from_str(&raw).map_err(|reason| ConfigError::invalid(var, &raw, reason)))
        .transpose()
}

/// `jobrunner` in the directory of the running executable.
fn default_runner_bin() -> PathBuf {
    let name = format!("jobrunner{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .unwrap_or_else(|| PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<RunnerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.allowed_jobs.is_permitted(EXAMPLE_JOB));
        assert_eq!(config.allowed_jobs.len(), 1);
        assert_eq!(config.launch_mode, LaunchMode::Process);
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.api_addr.port(), 8080);
        assert!(config.runner_bin.ends_with(format!(
            "jobrunner{}",
            std::env::consts::EXE_SUFFIX
        )));
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JOBRUNNER_ALLOWED_JOBS", "A.Job, B.Job"),
            ("JOBRUNNER_BIN", "/opt/jobrunner"),
            ("JOBRUNNER_LAUNCH", "inline"),
            ("JOBRUNNER_STORE", "Memory"),
            ("JOBRUNNER_API_ADDR", "127.0.0.1:9000"),
            ("JOBRUNNER_LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(config.allowed_jobs.is_permitted("B.Job"));
        assert!(!config.allowed_jobs.is_permitted(EXAMPLE_JOB));
        assert_eq!(config.runner_bin, PathBuf::from("/opt/jobrunner"));
        assert_eq!(config.launch_mode, LaunchMode::Inline);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.api_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("JOBRUNNER_LAUNCH", "  "), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(config.launch_mode, LaunchMode::Process);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn memory_store_launches_inline_by_default() {
        let config = load(&[("JOBRUNNER_STORE", "memory")]).unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.launch_mode, LaunchMode::Inline);
    }

    #[test]
    fn memory_store_rejects_process_launches() {
        let err = load(&[("JOBRUNNER_STORE", "memory"), ("JOBRUNNER_LAUNCH", "Process")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "JOBRUNNER_LAUNCH", .. }));

        let config = load(&[("JOBRUNNER_STORE", "sqlite"), ("JOBRUNNER_LAUNCH", "process")]).unwrap();
        assert_eq!(config.launch_mode, LaunchMode::Process);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[("JOBRUNNER_STORE", "redis")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "JOBRUNNER_STORE", .. }));

        let err = load(&[("JOBRUNNER_API_ADDR", "not-an-addr")]).unwrap_err();
        assert!(err.to_string().starts_with("invalid value for JOBRUNNER_API_ADDR"));
    }
}
