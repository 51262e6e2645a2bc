//! Baseline values applied before any file or environment override.
//!
//! # Design
//! - Keep every default in one place so the loader, docs, and tests agree.
//! - Defaults reproduce a single-machine demo deployment (CPU inference, local ffmpeg).

use std::net::{IpAddr, Ipv4Addr};

/// Address the HTTP listener binds to.
pub const BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// HTTP listener port.
pub const HTTP_PORT: u16 = 8000;
/// Base URL used to build links to final outputs.
pub const PUBLIC_BASE_URL: &str = "http://localhost:8000/";
/// Front-end origin allowed by CORS.
pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";
/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Root directory for all relative storage paths.
pub const BASE_DIR: &str = ".";
/// Directory holding raw uploads.
pub const UPLOADS_DIR: &str = "uploads";
/// Directory holding transcoded outputs.
pub const OUTPUTS_DIR: &str = "outputs";
/// Scratch base handed to the tracker as its project directory.
pub const RUNS_DIR: &str = "runs";
/// Container extension used for uploads and outputs.
pub const CONTAINER_EXTENSION: &str = "mp4";
/// Extensions recognised as tracker output videos.
pub const ARTIFACT_EXTENSIONS: &[&str] = &["mp4", "avi"];
/// URL path segment that serves the output directory.
pub const OUTPUTS_MOUNT: &str = "outputs";

/// Tracker executable (Ultralytics CLI).
pub const TRACKER_PROGRAM: &str = "yolo";
/// Tracker argument template; placeholders are substituted per request.
pub const TRACKER_ARGS: &[&str] = &[
    "track",
    "model={model}",
    "source={source}",
    "tracker={tracker}",
    "device={device}",
    "save=True",
    "project={project}",
    "name={name}",
    "exist_ok={exist_ok}",
    "verbose=True",
];
/// Pretrained detection weights.
pub const MODEL_PATH: &str = "models/yolov8n.pt";
/// Tracker association config shipped with the model library.
pub const TRACKER_CONFIG: &str = "bytetrack.yaml";
/// Compute device passed through to the tracker.
pub const DEVICE: &str = "cpu";
/// Prefix shared by every run directory.
pub const RUN_PREFIX: &str = "track";

/// Transcoder executable.
pub const FFMPEG_PROGRAM: &str = "ffmpeg";
/// Browser-compatible video codec.
pub const VIDEO_CODEC: &str = "libx264";
/// Broadly supported pixel format.
pub const PIXEL_FORMAT: &str = "yuv420p";
/// Encoder speed preset.
pub const PRESET: &str = "veryfast";

/// Concurrent pipeline jobs.
pub const MAX_CONCURRENT_JOBS: usize = 1;

/// Log level when `RUST_LOG` is unset.
pub const LOG_LEVEL: &str = "info";
