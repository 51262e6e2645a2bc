//! # Design
//!
//! - Constant-message errors for every pipeline stage.
//! - Context (paths, exit codes, tool diagnostics) travels in fields so callers
//!   decide how much of it reaches a client.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors produced while turning an upload into a playable output.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// IO failures while interacting with the filesystem.
    #[error("pipeline io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures.
    #[error("pipeline walkdir failure")]
    Walkdir {
        /// Operation that triggered the traversal failure.
        operation: &'static str,
        /// Path involved in the traversal failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// The uploaded payload contained no bytes.
    #[error("uploaded file is empty")]
    EmptyUpload {
        /// Upload path that was left empty.
        path: PathBuf,
    },
    /// The tracking tool could not be started or exited unsuccessfully.
    #[error("tracking failed")]
    Inference {
        /// Exit code when the process ran to completion.
        status: Option<i32>,
        /// Tail of the tool's diagnostics.
        diagnostics: String,
    },
    /// No run directory was found after tracking.
    #[error("No tracking output found")]
    NoRunFound {
        /// Scratch base that was searched.
        scratch: PathBuf,
        /// Selector used for the lookup.
        selector: String,
    },
    /// The run directory did not contain a video file.
    #[error("Output video not found")]
    ArtifactNotFound {
        /// Run directory that was searched.
        run_dir: PathBuf,
    },
    /// The transcoding tool exited unsuccessfully.
    #[error("transcoding failed")]
    Transcode {
        /// Exit code when the process ran to completion.
        status: Option<i32>,
        /// Diagnostics written by the tool.
        diagnostics: String,
    },
    /// An external tool could not be located or started.
    #[error("external tool unavailable")]
    ToolUnavailable {
        /// Program name or path as configured.
        program: String,
        /// Underlying spawn error when one was observed.
        source: Option<io::Error>,
    },
    /// A built-in output pattern failed to compile.
    #[error("pipeline pattern compile failure")]
    Pattern {
        /// Pattern that failed to compile.
        pattern: &'static str,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// The public base URL cannot be used to compose output links.
    #[error("invalid public base url")]
    InvalidBaseUrl {
        /// Configured value.
        value: String,
    },
    /// The job scheduler stopped accepting work.
    #[error("pipeline scheduler closed")]
    SchedulerClosed,
    /// Configured model weights are missing.
    #[error("model weights not found")]
    ModelMissing {
        /// Path that was checked.
        path: PathBuf,
    },
}

impl PipelineError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Message suitable for returning to the client that submitted the job.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Inference { diagnostics, .. } => with_detail("Tracking failed", diagnostics),
            Self::Transcode { diagnostics, .. } => with_detail("Transcoding failed", diagnostics),
            Self::ToolUnavailable { program, .. } => format!("Tool unavailable: {program}"),
            other => other.to_string(),
        }
    }

    /// Stable label used for the outcome metric.
    #[must_use]
    pub const fn outcome_label(&self) -> &'static str {
        match self {
            Self::Io { .. } | Self::Walkdir { .. } | Self::Pattern { .. } => "io_error",
            Self::SchedulerClosed => "cancelled",
            Self::EmptyUpload { .. } => "rejected",
            Self::Inference { .. } | Self::ModelMissing { .. } => "tracking_failed",
            Self::NoRunFound { .. } => "no_run",
            Self::ArtifactNotFound { .. } => "no_artifact",
            Self::Transcode { .. } => "transcode_failed",
            Self::ToolUnavailable { .. } | Self::InvalidBaseUrl { .. } => "unavailable",
        }
    }
}

fn with_detail(prefix: &str, diagnostics: &str) -> String {
    let detail = diagnostics.trim();
    if detail.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}: {detail}")
    }
}
