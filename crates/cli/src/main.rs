mod args;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use jobrunner_infra::jobs::{
    ConsoleRunLog, JobEngine, LaunchRequest, Launcher, ProcessLauncher, RunRequest,
    builtin_registry,
};
use jobrunner_infra::{LogFormat, RunnerConfig};

use crate::args::{Args, Command, JobArgs, RunArgs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match RunnerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error}");
            return ExitCode::from(2);
        }
    };

    // Logging
    if args.debug || config.log_format == LogFormat::Pretty {
        jobrunner_observability::init_pretty();
    } else {
        jobrunner_observability::init();
    }

    // Job outcomes never change the exit code; only process-level errors do.
    if let Err(error) = begin(args, config).await {
        error!(error = %format!("{error:#}"), "jobrunner failed");
        eprintln!("error: {error:#}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn begin(args: Args, config: RunnerConfig) -> Result<()> {
    match args.command {
        Command::Run(run) => run_job(run, &config).await,
        Command::Launch(job) => launch_job(job, &config),
    }
}

async fn run_job(run: RunArgs, config: &RunnerConfig) -> Result<()> {
    let store = jobrunner_infra::open_store(config)
        .await
        .context("failed to open job store")?;
    let engine = JobEngine::new(
        store,
        Arc::new(builtin_registry()),
        Arc::new(config.allowed_jobs.clone()),
        Arc::new(ConsoleRunLog),
    );

    let record = match run.job_id {
        Some(id) => engine
            .resume(id, run.job.delay)
            .await
            .with_context(|| format!("failed to resume job {id}"))?,
        None => {
            let request = RunRequest::new(run.job.target(), run.job.params.0)
                .with_priority(run.job.priority)
                .with_delay(run.job.delay);
            engine.execute(request).await.context("failed to run job")?
        }
    };

    info!(
        job_id = %record.id,
        status = %record.status,
        attempts = record.attempts,
        "job run finished"
    );
    Ok(())
}

fn launch_job(job: JobArgs, config: &RunnerConfig) -> Result<()> {
    let target = job.target();
    let request = LaunchRequest::new(target.clone(), job.params.0)
        .with_priority(job.priority)
        .with_delay(job.delay);

    ProcessLauncher::new(config.runner_bin.clone())
        .launch(&request)
        .context("failed to launch job")?;

    println!("Job launched: {target}");
    Ok(())
}
