use jobrunner_infra::{LogFormat, RunnerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RunnerConfig::from_env()?;
    match config.log_format {
        LogFormat::Json => jobrunner_observability::init(),
        LogFormat::Pretty => jobrunner_observability::init_pretty(),
    }

    let app = jobrunner_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.api_addr).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
