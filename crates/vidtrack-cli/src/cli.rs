//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliDependencies, CliResult, parse_url};
use crate::commands::track::handle_track;
use crate::commands::upload::handle_upload;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 900;

/// Parses CLI arguments, executes the requested command, and reports failures
/// on stderr. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();
    let deps = match CliDependencies::from_cli(&cli, &trace_id) {
        Ok(deps) => deps,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    match dispatch(cli, &deps).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, deps: &CliDependencies) -> CliResult<()> {
    match cli.command {
        Command::Track(args) => handle_track(args, cli.output).await,
        Command::Upload(args) => {
            let ctx = AppContext {
                client: deps.client.clone(),
                base_url: cli.api_url,
            };
            handle_upload(&ctx, args, cli.output).await
        }
    }
}

#[derive(Parser)]
#[command(name = "vidtrack", about = "Object tracking and re-encoding for uploaded videos")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "VIDTRACK_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    api_url: Url,
    #[arg(
        long,
        global = true,
        env = "VIDTRACK_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Select how results are printed"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run tracking and re-encoding locally against the configured storage.
    Track(TrackArgs),
    /// Upload a video to a running server and print the resulting URL.
    Upload(UploadArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct TrackArgs {
    /// Video file to process.
    pub(crate) video: PathBuf,
    /// YAML configuration file; falls back to `VIDTRACK_CONFIG`.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct UploadArgs {
    /// Video file to upload.
    pub(crate) video: PathBuf,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn upload_defaults_to_local_server() -> Result<()> {
        let cli = Cli::try_parse_from(["vidtrack", "upload", "clip.mp4"])?;
        assert_eq!(cli.api_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(cli.output, OutputFormat::Text);
        match cli.command {
            Command::Upload(args) => assert_eq!(args.video, PathBuf::from("clip.mp4")),
            Command::Track(_) => anyhow::bail!("parsed the wrong subcommand"),
        }
        Ok(())
    }

    #[test]
    fn track_accepts_config_and_json_output() -> Result<()> {
        let cli = Cli::try_parse_from([
            "vidtrack",
            "track",
            "clip.mp4",
            "--config",
            "vidtrack.yaml",
            "--output",
            "json",
        ])?;
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Command::Track(args) => {
                assert_eq!(args.config, Some(PathBuf::from("vidtrack.yaml")));
            }
            Command::Upload(_) => anyhow::bail!("parsed the wrong subcommand"),
        }
        Ok(())
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let parsed = Cli::try_parse_from(["vidtrack", "--api-url", "not a url", "upload", "a.mp4"]);
        assert!(parsed.is_err());
    }
}
