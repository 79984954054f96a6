use clap::{Parser, Subcommand};
use serde_json::Value;

use jobrunner_core::{JobId, Target};

#[derive(Parser, Debug)]
#[command(name = "jobrunner", about, long_about = None, version)]
pub(crate) struct Args {
    #[command(subcommand)]
    pub(crate) command: Command,
    /// Enables human-friendly logging.
    #[arg(short, long, global = true, default_value_t)]
    pub(crate) debug: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Run a job in this process: gate, attempts, record.
    Run(RunArgs),
    /// Start `jobrunner run` for a job as a detached process and return.
    Launch(JobArgs),
}

#[derive(clap::Args, Debug)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub(crate) job: JobArgs,
    /// Re-run an existing record that was reset for retry.
    #[arg(long)]
    pub(crate) job_id: Option<JobId>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct JobArgs {
    /// Qualified class name, e.g. `app::jobs::ExampleJob`.
    pub(crate) class: String,
    /// Method to invoke on the class.
    pub(crate) method: String,
    /// JSON argument list; a non-array value is passed as the only argument.
    #[arg(long, default_value = "[]", value_parser = parse_params)]
    pub(crate) params: Params,
    /// Seconds to wait before the first attempt.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub(crate) delay: i64,
    /// Stored and displayed only.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub(crate) priority: i32,
}

impl JobArgs {
    pub(crate) fn target(&self) -> Target {
        Target::new(self.class.clone(), self.method.clone())
    }
}

/// Positional job arguments.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Params(pub(crate) Vec<Value>);

pub(crate) fn parse_params(raw: &str) -> Result<Params, String> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("params must be valid JSON: {e}"))?;
    Ok(match value {
        Value::Array(items) => Params(items),
        other => Params(vec![other]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn params_array_is_the_argument_list() {
        assert_eq!(
            parse_params(r#"["hi", 2]"#).unwrap(),
            Params(vec![json!("hi"), json!(2)])
        );
        assert_eq!(parse_params("[]").unwrap(), Params(vec![]));
    }

    #[test]
    fn non_array_params_become_one_argument() {
        assert_eq!(parse_params(r#""hi""#).unwrap(), Params(vec![json!("hi")]));
        assert_eq!(
            parse_params(r#"{"k":1}"#).unwrap(),
            Params(vec![json!({"k": 1})])
        );
        assert!(parse_params("not json").is_err());
    }

    #[test]
    fn run_defaults() {
        let args = Args::try_parse_from(["jobrunner", "run", "A.Job", "handle"]).unwrap();
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.job.params, Params(vec![]));
        assert_eq!(run.job.delay, 0);
        assert_eq!(run.job.priority, 1);
        assert_eq!(run.job_id, None);
    }

    #[test]
    fn run_accepts_launcher_arguments() {
        let args = Args::try_parse_from([
            "jobrunner", "run", "A.Job", "handle", "--params", r#"["x"]"#, "--priority", "3",
            "--delay", "-1", "--job-id", "7",
        ])
        .unwrap();
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.job.target(), Target::new("A.Job", "handle"));
        assert_eq!(run.job.params, Params(vec![json!("x")]));
        assert_eq!(run.job.priority, 3);
        assert_eq!(run.job.delay, -1);
        assert_eq!(run.job_id, Some(JobId::new(7)));
    }

    #[test]
    fn invalid_job_id_is_rejected() {
        assert!(
            Args::try_parse_from(["jobrunner", "run", "A", "b", "--job-id", "0"]).is_err()
        );
    }
}
