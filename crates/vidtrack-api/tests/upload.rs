use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;
use vidtrack_api::ApiServer;
use vidtrack_pipeline::{
    CommandTracker, FfmpegTranscoder, Pipeline, PipelineError, PipelineResult, StorageLayout,
    TranscodeReport, Transcoder,
};
use vidtrack_telemetry::Metrics;
use vidtrack_test_support::{FakeTracker, TestWorkspace};

const BOUNDARY: &str = "vidtrack-test-boundary";

/// Stands in for ffmpeg by copying the tracker output verbatim.
struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn transcode(&self, src: &Path, dst: &Path) -> PipelineResult<TranscodeReport> {
        let bytes = tokio::fs::copy(src, dst)
            .await
            .map_err(|source| PipelineError::Io {
                operation: "test.copy",
                path: dst.to_path_buf(),
                source,
            })?;
        Ok(TranscodeReport {
            output: dst.to_path_buf(),
            bytes,
            elapsed: Duration::ZERO,
        })
    }
}

enum Encoder {
    Copy,
    FailingFfmpeg,
}

async fn router(workspace: &TestWorkspace, encoder: Encoder) -> anyhow::Result<Router> {
    let config = workspace.config();
    let layout = StorageLayout::prepare(&config.storage).await?;
    let tracker = Arc::new(CommandTracker::from_config(&config.inference)?);
    let transcoder: Arc<dyn Transcoder> = match encoder {
        Encoder::Copy => Arc::new(CopyTranscoder),
        // `sh` rejects the ffmpeg flags and exits non-zero with stderr output.
        Encoder::FailingFfmpeg => Arc::new(FfmpegTranscoder::new("sh", &config.transcode)),
    };
    let pipeline = Pipeline::new(config, layout, tracker, transcoder, Metrics::new()?)?;
    Ok(ApiServer::new(config, pipeline)?.into_router())
}

fn multipart(field: &str, filename: Option<&str>, bytes: &[u8]) -> anyhow::Result<Request<Body>> {
    let disposition = filename.map_or_else(
        || format!("form-data; name=\"{field}\""),
        |name| format!("form-data; name=\"{field}\"; filename=\"{name}\""),
    );
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: video/mp4\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Ok(Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))?)
}

async fn send(router: &Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Vec<u8>)> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, body.to_vec()))
}

async fn send_json(router: &Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let (status, body) = send(router, request).await?;
    Ok((status, serde_json::from_slice(&body)?))
}

#[tokio::test]
async fn upload_returns_url_of_served_output() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let (status, body) =
        send_json(&router, multipart("file", Some("clip.mp4"), b"raw video bytes")?).await?;
    assert_eq!(status, StatusCode::OK);
    let video_url = body["video_url"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("missing video_url in {body}"))?;
    let path = video_url
        .strip_prefix("http://localhost:8000")
        .ok_or_else(|| anyhow::anyhow!("unexpected url {video_url}"))?;
    assert!(path.starts_with("/outputs/"));
    assert!(path.ends_with(".mp4"));

    let file_name = path.trim_start_matches("/outputs/");
    assert!(workspace.root().join("outputs").join(file_name).is_file());
    assert!(workspace.root().join("uploads").join(file_name).is_file());

    let request = Request::builder().uri(path).body(Body::empty())?;
    let (status, served) = send(&router, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, b"raw video bytes");
    Ok(())
}

#[tokio::test]
async fn field_named_file_without_filename_is_accepted() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let (status, body) = send_json(&router, multipart("file", None, b"bytes")?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["video_url"].is_string());
    Ok(())
}

#[tokio::test]
async fn missing_run_directory_is_reported() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesNothing)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let (status, body) =
        send_json(&router, multipart("file", Some("clip.mp4"), b"video")?).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No tracking output found");
    assert!(body.get("video_url").is_none());
    Ok(())
}

#[tokio::test]
async fn run_without_video_is_reported() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesNoVideo)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let (status, body) =
        send_json(&router, multipart("file", Some("clip.mp4"), b"video")?).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Output video not found");
    Ok(())
}

#[tokio::test]
async fn tracker_failure_is_reported() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::Fails)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let (status, body) =
        send_json(&router, multipart("file", Some("clip.mp4"), b"video")?).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Tracking failed: CUDA device unavailable");
    Ok(())
}

#[tokio::test]
async fn transcoder_failure_returns_diagnostics() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
    let router = router(&workspace, Encoder::FailingFfmpeg).await?;

    let (status, body) =
        send_json(&router, multipart("file", Some("clip.mp4"), b"video")?).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap_or_default();
    assert!(message.starts_with("Transcoding failed: "), "{message}");
    assert!(message.len() > "Transcoding failed: ".len());
    assert!(body.get("video_url").is_none());
    Ok(())
}

#[tokio::test]
async fn identical_uploads_get_distinct_urls() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let (_, first) = send_json(&router, multipart("file", Some("a.mp4"), b"same")?).await?;
    let (_, second) = send_json(&router, multipart("file", Some("a.mp4"), b"same")?).await?;
    let first = first["video_url"].as_str().unwrap_or_default().to_string();
    let second = second["video_url"].as_str().unwrap_or_default().to_string();
    assert!(!first.is_empty());
    assert_ne!(first, second);

    let outputs = std::fs::read_dir(workspace.root().join("outputs"))?.count();
    assert_eq!(outputs, 2);
    Ok(())
}

#[tokio::test]
async fn request_without_file_field_is_rejected() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let (status, body) = send_json(&router, multipart("note", None, b"hello")?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing file field");
    Ok(())
}

#[tokio::test]
async fn empty_upload_is_rejected() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let (status, body) = send_json(&router, multipart("file", Some("empty.mp4"), b"")?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Uploaded file is empty");
    Ok(())
}

#[tokio::test]
async fn oversized_upload_is_rejected() -> anyhow::Result<()> {
    let mut workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
    workspace.config_mut().server.max_upload_bytes = 64;
    let router = router(&workspace, Encoder::Copy).await?;

    let (status, _) = send(&router, multipart("file", Some("big.mp4"), &[7_u8; 4_096])?).await?;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn health_metrics_and_cors() -> anyhow::Result<()> {
    let workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
    let router = router(&workspace, Encoder::Copy).await?;

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())?;
    let response = router.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("http://localhost:3000")
    );
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
    assert_eq!(body["status"], "ok");
    assert!(body["build_sha"].is_string());

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://evil.test")
        .body(Body::empty())?;
    let response = router.clone().oneshot(request).await?;
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );

    let request = Request::builder().uri("/metrics").body(Body::empty())?;
    let (status, body) = send(&router, request).await?;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body)?;
    assert!(text.contains("http_requests_total{code=\"200\",route=\"/health\"} 2"));
    Ok(())
}
