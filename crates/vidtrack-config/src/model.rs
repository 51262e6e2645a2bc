//! Typed configuration sections.
//!
//! # Design
//! - Pure data carriers; every section has a `Default` built from `defaults.rs`.
//! - Constructed once at startup and passed by reference into each component.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ConfigError;

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP listener and public URL settings.
    pub server: ServerConfig,
    /// Directory layout for uploads, scratch runs, and outputs.
    pub storage: StorageConfig,
    /// External detection/tracking tool invocation.
    pub inference: InferenceConfig,
    /// External transcoding tool invocation.
    pub transcode: TranscodeConfig,
    /// Job scheduling limits.
    pub pipeline: PipelineConfig,
    /// Logging output.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface the listener binds to.
    pub bind_addr: IpAddr,
    /// Listener port.
    pub port: u16,
    /// Absolute base URL used when composing output links.
    pub public_base_url: String,
    /// Origins allowed by the CORS policy.
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR,
            port: defaults::HTTP_PORT,
            public_base_url: defaults::PUBLIC_BASE_URL.to_string(),
            allowed_origins: vec![defaults::ALLOWED_ORIGIN.to_string()],
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }
}

/// Storage layout. Relative directories resolve against `base_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Root for relative paths.
    pub base_dir: PathBuf,
    /// Raw upload directory.
    pub uploads_dir: PathBuf,
    /// Final output directory (served statically).
    pub outputs_dir: PathBuf,
    /// Scratch base for tracker run directories.
    pub runs_dir: PathBuf,
    /// Container extension for uploads and outputs.
    pub container_extension: String,
    /// Extensions accepted as tracker output videos.
    pub artifact_extensions: Vec<String>,
    /// URL path segment under which outputs are served.
    pub outputs_mount: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(defaults::BASE_DIR),
            uploads_dir: PathBuf::from(defaults::UPLOADS_DIR),
            outputs_dir: PathBuf::from(defaults::OUTPUTS_DIR),
            runs_dir: PathBuf::from(defaults::RUNS_DIR),
            container_extension: defaults::CONTAINER_EXTENSION.to_string(),
            artifact_extensions: defaults::ARTIFACT_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            outputs_mount: defaults::OUTPUTS_MOUNT.to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolve `dir` against the base directory unless it is already absolute.
    #[must_use]
    pub fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.base_dir.join(dir)
        }
    }

    /// Absolute-or-base-relative upload directory.
    #[must_use]
    pub fn uploads_path(&self) -> PathBuf {
        self.resolve(&self.uploads_dir)
    }

    /// Absolute-or-base-relative output directory.
    #[must_use]
    pub fn outputs_path(&self) -> PathBuf {
        self.resolve(&self.outputs_dir)
    }

    /// Absolute-or-base-relative scratch run directory.
    #[must_use]
    pub fn runs_path(&self) -> PathBuf {
        self.resolve(&self.runs_dir)
    }
}

/// How the run directory of an invocation is found after the tracker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// The run directory is named `<prefix>-<job id>` and looked up directly.
    #[default]
    Token,
    /// The most recently modified `<prefix>*` directory is selected.
    Latest,
}

impl DiscoveryMode {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Latest => "latest",
        }
    }
}

impl FromStr for DiscoveryMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "latest" => Ok(Self::Latest),
            _ => Err(ConfigError::invalid_field(
                "inference",
                "discovery",
                Some(value.to_string()),
                "unknown_mode",
            )),
        }
    }
}

/// Detection/tracking tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Program name (looked up on `PATH`) or explicit path.
    pub program: String,
    /// Argument template with `{source}`, `{project}`, `{name}`, `{model}`,
    /// `{tracker}`, `{device}` and `{exist_ok}` placeholders.
    pub args: Vec<String>,
    /// Model weights handed to the tool.
    pub model: String,
    /// Tracker association config handed to the tool.
    pub tracker: String,
    /// Compute device string.
    pub device: String,
    /// Prefix shared by all run directories.
    pub run_prefix: String,
    /// Run directory discovery strategy.
    pub discovery: DiscoveryMode,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            program: defaults::TRACKER_PROGRAM.to_string(),
            args: defaults::TRACKER_ARGS
                .iter()
                .map(ToString::to_string)
                .collect(),
            model: defaults::MODEL_PATH.to_string(),
            tracker: defaults::TRACKER_CONFIG.to_string(),
            device: defaults::DEVICE.to_string(),
            run_prefix: defaults::RUN_PREFIX.to_string(),
            discovery: DiscoveryMode::default(),
        }
    }
}

/// Transcoding tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscodeConfig {
    /// ffmpeg program name or path.
    pub ffmpeg: String,
    /// Output video codec.
    pub video_codec: String,
    /// Output pixel format.
    pub pixel_format: String,
    /// Encoder preset.
    pub preset: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg: defaults::FFMPEG_PROGRAM.to_string(),
            video_codec: defaults::VIDEO_CODEC.to_string(),
            pixel_format: defaults::PIXEL_FORMAT.to_string(),
            preset: defaults::PRESET.to_string(),
        }
    }
}

/// Job scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Number of jobs allowed through the pipeline at once.
    pub max_concurrent_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: defaults::MAX_CONCURRENT_JOBS,
        }
    }
}

/// Log output selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl FromStr for LogOutput {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(ConfigError::invalid_field(
                "logging",
                "format",
                Some(value.to_string()),
                "unknown_format",
            )),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Level used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format; inferred from the build profile when unset.
    pub format: Option<LogOutput>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
