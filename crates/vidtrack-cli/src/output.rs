//! Renderers for command results.

use anyhow::anyhow;
use serde::Serialize;
use vidtrack_api::UploadResponse;
use vidtrack_pipeline::{JobId, PipelineOutcome};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

#[derive(Serialize)]
struct TrackSummary<'a> {
    job_id: &'a JobId,
    video_url: &'a str,
    output_path: String,
    frames: u64,
}

pub(crate) fn render_upload(response: &UploadResponse, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(response)?),
        OutputFormat::Text => println!("{}", response.video_url),
    }
    Ok(())
}

pub(crate) fn render_track(outcome: &PipelineOutcome, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let summary = TrackSummary {
                job_id: &outcome.job_id,
                video_url: &outcome.video_url,
                output_path: outcome.output_path.display().to_string(),
                frames: outcome.frames,
            };
            println!("{}", to_json(&summary)?);
        }
        OutputFormat::Text => {
            println!("job: {}", outcome.job_id);
            println!("frames: {}", outcome.frames);
            println!("output: {}", outcome.output_path.display());
            println!("url: {}", outcome.video_url);
        }
    }
    Ok(())
}

fn to_json(value: &impl Serialize) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}
