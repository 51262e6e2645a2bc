//! JSON bodies exchanged with clients.

use serde::{Deserialize, Serialize};
use vidtrack_telemetry::MetricsSnapshot;

/// Successful upload response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Absolute URL of the processed video.
    pub video_url: String,
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable failure description.
    pub error: String,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Build identifier.
    pub build_sha: String,
    /// Selected pipeline gauges.
    pub metrics: MetricsSnapshot,
}
