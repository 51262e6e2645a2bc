use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use vidtrack_api::ApiServer;
use vidtrack_config::{ConfigLoader, LogOutput, ServiceConfig};
use vidtrack_pipeline::{
    CommandTracker, FfmpegTranscoder, Pipeline, StorageLayout, resolve_model, resolve_program,
};
use vidtrack_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the service.
#[derive(Debug, Clone)]
pub struct BootstrapDependencies {
    /// Fully merged and validated configuration.
    pub config: ServiceConfig,
}

impl BootstrapDependencies {
    /// Load configuration from `VIDTRACK_CONFIG` and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration cannot be loaded or is invalid.
    pub fn from_env() -> AppResult<Self> {
        let config = ConfigLoader::from_process_env()
            .load()
            .map_err(|err| AppError::config("config.load", err))?;
        Ok(Self { config })
    }
}

/// Bootstraps the service using configuration from the environment.
///
/// # Errors
///
/// Returns an error if configuration, telemetry, tool resolution, or the server fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
///
/// # Errors
///
/// Returns an error if telemetry, tool resolution, or the server fails.
pub async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies { config } = dependencies;
    vidtrack_telemetry::init_logging(&logging_config(&config))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("bootstrap");

    info!("vidtrack bootstrap starting");
    let pipeline = build_pipeline(&config).await?;

    let addr = SocketAddr::new(config.server.bind_addr, config.server.port);
    let server =
        ApiServer::new(&config, pipeline).map_err(|err| AppError::api_server("api.new", err))?;
    server
        .serve(addr)
        .await
        .map_err(|err| AppError::api_server("api.serve", err))?;

    info!("API server shutdown complete");
    Ok(())
}

/// Logging settings derived from configuration.
#[must_use]
pub fn logging_config(config: &ServiceConfig) -> LoggingConfig<'_> {
    let format = match config.logging.format {
        Some(LogOutput::Json) => LogFormat::Json,
        Some(LogOutput::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    LoggingConfig {
        level: &config.logging.level,
        format,
        ..LoggingConfig::default()
    }
}

/// Prepare storage, resolve external tools, and assemble the pipeline.
///
/// Fails fast when a directory cannot be created, a tool is missing from
/// `PATH`, or local model weights are absent.
///
/// # Errors
///
/// Returns [`AppError::Pipeline`] or [`AppError::Telemetry`] for the first failed step.
pub async fn build_pipeline(config: &ServiceConfig) -> AppResult<Pipeline> {
    let layout = StorageLayout::prepare(&config.storage)
        .await
        .map_err(|err| AppError::pipeline("storage.prepare", err))?;

    let tracker_program = resolve_program(&config.inference.program)
        .map_err(|err| AppError::pipeline("tools.resolve_tracker", err))?;
    let ffmpeg = resolve_program(&config.transcode.ffmpeg)
        .map_err(|err| AppError::pipeline("tools.resolve_ffmpeg", err))?;
    let model = resolve_model(&config.inference.model, &config.storage.base_dir)
        .map_err(|err| AppError::pipeline("tools.resolve_model", err))?;

    let mut resolved = config.clone();
    resolved.inference.model = model;

    let tracker = CommandTracker::new(tracker_program, resolved.inference.args.clone())
        .map_err(|err| AppError::pipeline("tracker.new", err))?;
    let transcoder = FfmpegTranscoder::new(ffmpeg, &resolved.transcode);
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("metrics.new", err))?;

    let pipeline = Pipeline::new(
        &resolved,
        layout,
        Arc::new(tracker),
        Arc::new(transcoder),
        metrics,
    )
    .map_err(|err| AppError::pipeline("pipeline.new", err))?;

    info!(
        uploads = %pipeline.layout().uploads_dir().display(),
        outputs = %pipeline.layout().outputs_dir().display(),
        discovery = resolved.inference.discovery.as_str(),
        max_jobs = resolved.pipeline.max_concurrent_jobs,
        "pipeline ready"
    );
    Ok(pipeline)
}
