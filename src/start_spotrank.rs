//! Startup helpers for the spotrank server.

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;

use crate::ranking::{RankingBackends, RankingConfig, RankingPipeline, RankingResult};
use crate::server::{self, AppState};

/// Run the server until Ctrl-C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting spotrank v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    rt.block_on(serve(&config))
}

/// Read and validate configuration from the environment.
///
/// # Errors
/// Returns an error if a variable cannot be parsed or validation fails.
pub fn load_config() -> RankingResult<RankingConfig> {
    let config = RankingConfig::from_env()?;
    config.validate()?;
    tracing::info!(
        provider = ?config.embedding.provider,
        model = %config.embedding.model,
        collection = %config.index.collection,
        sqlite_path = %config.index.sqlite_path.display(),
        "configuration loaded"
    );
    Ok(config)
}

/// Build the pipeline from validated configuration.
///
/// # Errors
/// Returns an error if a backend cannot be constructed or the collection
/// does not match the configured dimension.
pub async fn initialize(config: &RankingConfig) -> RankingResult<RankingPipeline> {
    let backends = RankingBackends::sqlite(config).await?;
    RankingPipeline::new(config, backends)
}

async fn serve(config: &RankingConfig) -> ExitCode {
    let pipeline = match initialize(config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Failed to initialize ranking pipeline: {e}");
            return ExitCode::from(1);
        }
    };

    let shutdown = CancellationToken::new();
    let state = AppState::new(pipeline, shutdown.clone());

    let signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        tracing::info!("Shutdown requested");
        shutdown.cancel();
    };

    if let Err(e) = server::run_server_with_shutdown(state, &config.server, signal).await {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}
