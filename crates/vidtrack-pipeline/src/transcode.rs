//! Re-encoding tracker output into a browser-playable container.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};
use vidtrack_config::TranscodeConfig;

use crate::error::{PipelineError, PipelineResult};
use crate::process::run_drained;

/// Outcome of a successful transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeReport {
    /// Written output file.
    pub output: PathBuf,
    /// Size of the output in bytes.
    pub bytes: u64,
    /// Wall time of the encode.
    pub elapsed: Duration,
}

/// Normalises a video into the output format.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode `src` into `dst`, overwriting `dst` if present.
    async fn transcode(&self, src: &Path, dst: &Path) -> PipelineResult<TranscodeReport>;
}

/// [`Transcoder`] shelling out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    video_codec: String,
    pixel_format: String,
    preset: String,
}

impl FfmpegTranscoder {
    /// Transcoder running `program` with the encoding settings from `config`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, config: &TranscodeConfig) -> Self {
        Self {
            program: program.into(),
            video_codec: config.video_codec.clone(),
            pixel_format: config.pixel_format.clone(),
            preset: config.preset.clone(),
        }
    }

    /// Transcoder running the program named in `config`.
    #[must_use]
    pub fn from_config(config: &TranscodeConfig) -> Self {
        Self::new(&config.ffmpeg, config)
    }

    /// Arguments for encoding `src` into `dst`.
    #[must_use]
    pub fn build_args(&self, src: &Path, dst: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(src.as_os_str().to_os_string());
        for arg in [
            "-c:v",
            self.video_codec.as_str(),
            "-preset",
            self.preset.as_str(),
            "-pix_fmt",
            self.pixel_format.as_str(),
            "-movflags",
            "+faststart",
            "-an",
        ] {
            args.push(OsString::from(arg));
        }
        args.push(dst.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, src: &Path, dst: &Path) -> PipelineResult<TranscodeReport> {
        let mut command = Command::new(&self.program);
        command.args(self.build_args(src, dst));

        info!(src = %src.display(), dst = %dst.display(), "transcode started");
        let completed = run_drained(command, "ffmpeg", None)
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    PipelineError::ToolUnavailable {
                        program: self.program.to_string_lossy().into_owned(),
                        source: Some(err),
                    }
                } else {
                    PipelineError::io("transcode.run", &self.program, err)
                }
            })?;

        if !completed.status.success() {
            let diagnostics = completed.diagnostics();
            warn!(
                status = ?completed.status.code(),
                diagnostics = %diagnostics,
                "transcode failed"
            );
            return Err(PipelineError::Transcode {
                status: completed.status.code(),
                diagnostics,
            });
        }

        let bytes = tokio::fs::metadata(dst)
            .await
            .map_err(|source| PipelineError::io("transcode.output_metadata", dst, source))?
            .len();
        info!(bytes, "transcode finished");
        Ok(TranscodeReport {
            output: dst.to_path_buf(),
            bytes,
            elapsed: completed.elapsed,
        })
    }
}
