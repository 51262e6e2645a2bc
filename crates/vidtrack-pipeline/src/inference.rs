//! Detection and tracking through an external model tool.
//!
//! # Design
//! - The tool is a subprocess driven by an argument template, so any CLI that
//!   takes a source and an output location can stand in for the default.
//! - `track` is a blocking completion: it returns after every output line has
//!   been drained and the process has exited, so the annotated video is closed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{info, warn};
use vidtrack_config::InferenceConfig;

use crate::error::{PipelineError, PipelineResult};
use crate::process::run_drained;

const FRAME_PATTERN: &str = r"\(frame \d+/\d+\)";

/// Inputs for one tracking invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    /// Video to process.
    pub source: PathBuf,
    /// Scratch base the tool writes run directories into.
    pub project: PathBuf,
    /// Run directory name requested from the tool.
    pub name: String,
    /// Whether the tool may write into an existing run directory named `name`.
    /// When false the tool must create a fresh, auto-numbered directory.
    pub reuse_run: bool,
    /// Model weights.
    pub model: String,
    /// Tracker association config.
    pub tracker: String,
    /// Compute device.
    pub device: String,
}

/// Completion signal of a tracking invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceReport {
    /// Per-frame result lines observed.
    pub frames: u64,
    /// Total output lines drained from both streams.
    pub lines: u64,
    /// Exit code of the tool.
    pub exit_code: Option<i32>,
    /// Wall time of the invocation.
    pub elapsed: Duration,
}

/// Runs detection and tracking over a video and saves an annotated copy.
#[async_trait]
pub trait TrackingEngine: Send + Sync {
    /// Process `request.source`, writing outputs under `request.project`.
    async fn track(&self, request: &TrackRequest) -> PipelineResult<InferenceReport>;
}

/// [`TrackingEngine`] backed by a command-line tool.
#[derive(Debug, Clone)]
pub struct CommandTracker {
    program: PathBuf,
    args: Vec<String>,
    frame_pattern: Regex,
}

impl CommandTracker {
    /// Tracker invoking `program` with the argument template `args`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Pattern`] if the frame pattern fails to compile.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> PipelineResult<Self> {
        let frame_pattern = Regex::new(FRAME_PATTERN).map_err(|source| PipelineError::Pattern {
            pattern: FRAME_PATTERN,
            source,
        })?;
        Ok(Self {
            program: program.into(),
            args,
            frame_pattern,
        })
    }

    /// Tracker using the configured program and template.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Pattern`] if the frame pattern fails to compile.
    pub fn from_config(config: &InferenceConfig) -> PipelineResult<Self> {
        Self::new(&config.program, config.args.clone())
    }

    /// Program this tracker runs.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Substitute request values into the argument template.
    ///
    /// `{exist_ok}` renders as `True` or `False` following
    /// [`TrackRequest::reuse_run`].
    #[must_use]
    pub fn render_args(&self, request: &TrackRequest) -> Vec<String> {
        let source = request.source.to_string_lossy();
        let project = request.project.to_string_lossy();
        let exist_ok = if request.reuse_run { "True" } else { "False" };
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{source}", &source)
                    .replace("{project}", &project)
                    .replace("{name}", &request.name)
                    .replace("{model}", &request.model)
                    .replace("{tracker}", &request.tracker)
                    .replace("{device}", &request.device)
                    .replace("{exist_ok}", exist_ok)
            })
            .collect()
    }
}

#[async_trait]
impl TrackingEngine for CommandTracker {
    async fn track(&self, request: &TrackRequest) -> PipelineResult<InferenceReport> {
        let mut command = Command::new(&self.program);
        command.args(self.render_args(request));

        info!(
            program = %self.program.display(),
            source = %request.source.display(),
            run = %request.name,
            device = %request.device,
            "tracking started"
        );
        let completed = run_drained(command, "tracker", Some(&self.frame_pattern))
            .await
            .map_err(|err| PipelineError::Inference {
                status: None,
                diagnostics: err.to_string(),
            })?;

        let exit_code = completed.status.code();
        if !completed.status.success() {
            let diagnostics = completed.diagnostics();
            warn!(?exit_code, diagnostics = %diagnostics, "tracking tool failed");
            return Err(PipelineError::Inference {
                status: exit_code,
                diagnostics,
            });
        }

        let report = InferenceReport {
            frames: completed.frames(),
            lines: completed.stdout.lines + completed.stderr.lines,
            exit_code,
            elapsed: completed.elapsed,
        };
        info!(
            frames = report.frames,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "tracking finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(project: &Path) -> TrackRequest {
        TrackRequest {
            source: PathBuf::from("/data/uploads/a.mp4"),
            project: project.to_path_buf(),
            name: "track-a".into(),
            reuse_run: true,
            model: "models/yolov8n.pt".into(),
            tracker: "bytetrack.yaml".into(),
            device: "cpu".into(),
        }
    }

    #[test]
    fn default_template_renders_every_placeholder() -> anyhow::Result<()> {
        let tracker = CommandTracker::from_config(&InferenceConfig::default())?;
        let args = tracker.render_args(&request(Path::new("/data/runs")));
        assert_eq!(
            args,
            vec![
                "track",
                "model=models/yolov8n.pt",
                "source=/data/uploads/a.mp4",
                "tracker=bytetrack.yaml",
                "device=cpu",
                "save=True",
                "project=/data/runs",
                "name=track-a",
                "exist_ok=True",
                "verbose=True",
            ]
        );
        assert_eq!(tracker.program(), Path::new("yolo"));
        Ok(())
    }

    #[test]
    fn fresh_run_renders_exist_ok_false() -> anyhow::Result<()> {
        let tracker = CommandTracker::from_config(&InferenceConfig::default())?;
        let mut request = request(Path::new("/data/runs"));
        request.name = "track".into();
        request.reuse_run = false;
        let args = tracker.render_args(&request);
        assert!(args.iter().any(|arg| arg == "exist_ok=False"));
        assert!(!args.iter().any(|arg| arg.contains("exist_ok=True")));
        Ok(())
    }

    #[tokio::test]
    async fn track_counts_frames_and_waits_for_outputs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let script = "mkdir -p \"$1/$2\"; \
            for i in 1 2 3 4 5; do echo \"video 1/1 (frame $i/5) 1 car\" >&2; done; \
            printf annotated > \"$1/$2/out.avi\"";
        let tracker = CommandTracker::new(
            "sh",
            vec![
                "-c".into(),
                script.into(),
                "sh".into(),
                "{project}".into(),
                "{name}".into(),
            ],
        )?;

        let report = tracker.track(&request(temp.path())).await?;
        assert_eq!(report.frames, 5);
        assert_eq!(report.lines, 5);
        assert_eq!(report.exit_code, Some(0));
        assert_eq!(
            std::fs::read(temp.path().join("track-a/out.avi"))?,
            b"annotated"
        );
        Ok(())
    }

    #[tokio::test]
    async fn non_zero_exit_surfaces_diagnostics() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let tracker = CommandTracker::new(
            "sh",
            vec!["-c".into(), "echo 'model not found' >&2; exit 4".into()],
        )?;

        let err = tracker.track(&request(temp.path())).await.err();
        match err {
            Some(PipelineError::Inference {
                status,
                diagnostics,
            }) => {
                assert_eq!(status, Some(4));
                assert_eq!(diagnostics, "model not found");
            }
            other => anyhow::bail!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn missing_program_is_a_tracking_failure() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let tracker = CommandTracker::new("/no/such/tracker", Vec::new())?;
        let err = tracker.track(&request(temp.path())).await.err();
        assert!(matches!(
            err,
            Some(PipelineError::Inference { status: None, .. })
        ));
        Ok(())
    }
}
