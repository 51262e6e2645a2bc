//! `vidtrack track`: run the pipeline in-process against local storage.

use std::path::Path;

use anyhow::anyhow;
use vidtrack_config::{ConfigLoader, ServiceConfig};
use vidtrack_pipeline::{PipelineError, PipelineOutcome};

use crate::cli::{OutputFormat, TrackArgs};
use crate::client::{CliError, CliResult};
use crate::output::render_track;

pub(crate) async fn handle_track(args: TrackArgs, format: OutputFormat) -> CliResult<()> {
    let mut loader = ConfigLoader::from_process_env();
    if let Some(path) = args.config {
        loader = loader.with_file(path);
    }
    let config = loader
        .load()
        .map_err(|err| CliError::validation(format!("invalid configuration: {err}")))?;

    let outcome = track_video(&config, &args.video).await?;
    render_track(&outcome, format)
}

async fn track_video(config: &ServiceConfig, video: &Path) -> CliResult<PipelineOutcome> {
    if !video.is_file() {
        return Err(CliError::validation(format!(
            "video file not found: {}",
            video.display()
        )));
    }

    let pipeline = vidtrack_app::build_pipeline(config)
        .await
        .map_err(CliError::failure)?;
    pipeline.process_file(video).await.map_err(|err| match err {
        PipelineError::EmptyUpload { .. } => CliError::validation(err.client_message()),
        other => CliError::failure(anyhow!(other.client_message())),
    })
}
