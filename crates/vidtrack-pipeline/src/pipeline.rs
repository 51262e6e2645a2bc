//! Coordinator running track, locate, transcode, and compose for one job.
//!
//! # Design
//! - Stages run strictly in order; the first failure ends the job with no
//!   retry and no cleanup.
//! - A semaphore bounds how many jobs run the external tools at once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{Instrument, info, info_span, warn};
use vidtrack_config::{DiscoveryMode, ServiceConfig};
use vidtrack_telemetry::Metrics;

use crate::error::{PipelineError, PipelineResult};
use crate::inference::{InferenceReport, TrackRequest, TrackingEngine};
use crate::locator::{ProducedArtifact, RunDirectory, RunSelector, find_artifact, locate_run};
use crate::response::ResponseComposer;
use crate::storage::{JobId, StorageLayout, UploadRecord};
use crate::transcode::{TranscodeReport, Transcoder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Track,
    Locate,
    Transcode,
    Compose,
}

impl Stage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Locate => "locate",
            Self::Transcode => "transcode",
            Self::Compose => "compose",
        }
    }
}

/// Result of a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Job identifier.
    pub job_id: JobId,
    /// Absolute URL of the final output.
    pub video_url: String,
    /// Final output on disk.
    pub output_path: PathBuf,
    /// Frames reported by the tracker.
    pub frames: u64,
}

/// Tracking parameters fixed at startup.
#[derive(Debug, Clone)]
struct TrackSettings {
    model: String,
    tracker: String,
    device: String,
    run_prefix: String,
    discovery: DiscoveryMode,
    artifact_extensions: Vec<String>,
}

/// Shared, cloneable handle to the processing pipeline.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    layout: StorageLayout,
    tracker: Arc<dyn TrackingEngine>,
    transcoder: Arc<dyn Transcoder>,
    composer: ResponseComposer,
    settings: TrackSettings,
    slots: Semaphore,
    metrics: Metrics,
}

impl Pipeline {
    /// Assemble a pipeline from configuration and injected tools.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBaseUrl`] when output URLs cannot be composed.
    pub fn new(
        config: &ServiceConfig,
        layout: StorageLayout,
        tracker: Arc<dyn TrackingEngine>,
        transcoder: Arc<dyn Transcoder>,
        metrics: Metrics,
    ) -> PipelineResult<Self> {
        let composer = ResponseComposer::new(
            &config.server.public_base_url,
            &config.storage.outputs_mount,
        )?;
        let settings = TrackSettings {
            model: config.inference.model.clone(),
            tracker: config.inference.tracker.clone(),
            device: config.inference.device.clone(),
            run_prefix: config.inference.run_prefix.clone(),
            discovery: config.inference.discovery,
            artifact_extensions: config.storage.artifact_extensions.clone(),
        };
        Ok(Self {
            inner: Arc::new(PipelineInner {
                layout,
                tracker,
                transcoder,
                composer,
                settings,
                slots: Semaphore::new(config.pipeline.max_concurrent_jobs.max(1)),
                metrics,
            }),
        })
    }

    /// Storage layout jobs read from and write to.
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.inner.layout
    }

    /// Metrics registry the pipeline reports into.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Copy a local file into storage and process it.
    ///
    /// # Errors
    ///
    /// Returns the first storage or stage failure.
    pub async fn process_file(&self, source: &Path) -> PipelineResult<PipelineOutcome> {
        let id = self.inner.layout.allocate();
        let record = self.inner.layout.import_file(id, source).await?;
        self.inner.metrics.add_upload_bytes(record.bytes);
        self.process(&record).await
    }

    /// Run every stage for a persisted upload.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage.
    pub async fn process(&self, upload: &UploadRecord) -> PipelineResult<PipelineOutcome> {
        let span = info_span!("pipeline.job", job_id = %upload.job_id, bytes = upload.bytes);
        async {
            let _permit = self
                .inner
                .slots
                .acquire()
                .await
                .map_err(|_| PipelineError::SchedulerClosed)?;
            let _active = ActiveJob::enter(&self.inner.metrics);

            let result = self.run_stages(upload).await;
            match &result {
                Ok(outcome) => {
                    self.inner.metrics.inc_pipeline_job("completed");
                    info!(video_url = %outcome.video_url, frames = outcome.frames, "job completed");
                }
                Err(err) => {
                    self.inner.metrics.inc_pipeline_job(err.outcome_label());
                    warn!(error = %err, outcome = err.outcome_label(), "job failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, upload: &UploadRecord) -> PipelineResult<PipelineOutcome> {
        let id = upload.job_id;
        let settings = &self.inner.settings;
        // Latest discovery only works when every invocation creates its own
        // auto-numbered directory, so the tool must not reuse `<prefix>`.
        let (run_name, reuse_run, selector) = match settings.discovery {
            DiscoveryMode::Token => {
                let name = format!("{}-{id}", settings.run_prefix);
                (name.clone(), true, RunSelector::Token(name))
            }
            DiscoveryMode::Latest => (settings.run_prefix.clone(), false, RunSelector::Latest),
        };

        let request = TrackRequest {
            source: upload.path.clone(),
            project: self.inner.layout.runs_dir().to_path_buf(),
            name: run_name,
            reuse_run,
            model: settings.model.clone(),
            tracker: settings.tracker.clone(),
            device: settings.device.clone(),
        };
        let started = Instant::now();
        let report: InferenceReport = self.inner.tracker.track(&request).await?;
        self.observe(Stage::Track, started);

        let started = Instant::now();
        let (run, artifact): (RunDirectory, ProducedArtifact) = {
            let run = locate_run(
                self.inner.layout.runs_dir(),
                &settings.run_prefix,
                &selector,
            )?;
            let artifact = find_artifact(&run.path, &settings.artifact_extensions)?;
            (run, artifact)
        };
        self.observe(Stage::Locate, started);
        info!(run = %run.name, artifact = %artifact.path.display(), "tracker output located");

        let started = Instant::now();
        let output = self.inner.layout.output_path(id);
        let transcoded: TranscodeReport = self
            .inner
            .transcoder
            .transcode(&artifact.path, &output)
            .await?;
        self.observe(Stage::Transcode, started);

        let started = Instant::now();
        let video_url = self
            .inner
            .composer
            .video_url(&self.inner.layout.file_name(id));
        self.observe(Stage::Compose, started);

        Ok(PipelineOutcome {
            job_id: id,
            video_url,
            output_path: transcoded.output,
            frames: report.frames,
        })
    }

    fn observe(&self, stage: Stage, started: Instant) {
        self.inner
            .metrics
            .observe_stage(stage.as_str(), started.elapsed());
    }
}

struct ActiveJob<'a> {
    metrics: &'a Metrics,
}

impl<'a> ActiveJob<'a> {
    fn enter(metrics: &'a Metrics) -> Self {
        metrics.job_started();
        Self { metrics }
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.metrics.job_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Tracker that writes a run directory according to `layout`.
    struct ScriptedTracker {
        layout: RunLayout,
        requests: Mutex<Vec<TrackRequest>>,
    }

    #[derive(Clone, Copy)]
    enum RunLayout {
        WithVideo,
        WithoutVideo,
        Nothing,
    }

    #[async_trait]
    impl TrackingEngine for ScriptedTracker {
        async fn track(&self, request: &TrackRequest) -> PipelineResult<InferenceReport> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            let run = request.project.join(&request.name);
            match self.layout {
                RunLayout::WithVideo => {
                    std::fs::create_dir_all(&run)
                        .map_err(|source| PipelineError::io("test.run", &run, source))?;
                    std::fs::write(run.join("clip.avi"), b"annotated")
                        .map_err(|source| PipelineError::io("test.video", &run, source))?;
                }
                RunLayout::WithoutVideo => {
                    std::fs::create_dir_all(&run)
                        .map_err(|source| PipelineError::io("test.run", &run, source))?;
                }
                RunLayout::Nothing => {}
            }
            Ok(InferenceReport {
                frames: 7,
                lines: 7,
                exit_code: Some(0),
                elapsed: Duration::from_millis(1),
            })
        }
    }

    /// Transcoder that copies its input.
    #[derive(Default)]
    struct CopyTranscoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        async fn transcode(&self, src: &Path, dst: &Path) -> PipelineResult<TranscodeReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let bytes = tokio::fs::copy(src, dst)
                .await
                .map_err(|source| PipelineError::io("test.copy", dst, source))?;
            Ok(TranscodeReport {
                output: dst.to_path_buf(),
                bytes,
                elapsed: Duration::ZERO,
            })
        }
    }

    struct Harness {
        _temp: tempfile::TempDir,
        pipeline: Pipeline,
        tracker: Arc<ScriptedTracker>,
        transcoder: Arc<CopyTranscoder>,
    }

    async fn harness(layout: RunLayout, discovery: DiscoveryMode) -> anyhow::Result<Harness> {
        let temp = tempfile::tempdir()?;
        let mut config = ServiceConfig::default();
        config.storage.base_dir = temp.path().to_path_buf();
        config.inference.discovery = discovery;
        let storage = StorageLayout::prepare(&config.storage).await?;
        let tracker = Arc::new(ScriptedTracker {
            layout,
            requests: Mutex::new(Vec::new()),
        });
        let transcoder = Arc::new(CopyTranscoder::default());
        let pipeline = Pipeline::new(
            &config,
            storage,
            tracker.clone(),
            transcoder.clone(),
            Metrics::new()?,
        )?;
        Ok(Harness {
            _temp: temp,
            pipeline,
            tracker,
            transcoder,
        })
    }

    async fn upload(pipeline: &Pipeline, bytes: &[u8]) -> anyhow::Result<UploadRecord> {
        let layout = pipeline.layout();
        let mut sink = layout.begin_upload(layout.allocate()).await?;
        sink.write_chunk(bytes).await?;
        Ok(sink.finish().await?)
    }

    #[tokio::test]
    async fn successful_job_produces_output_and_url() -> anyhow::Result<()> {
        let harness = harness(RunLayout::WithVideo, DiscoveryMode::Token).await?;
        let record = upload(&harness.pipeline, b"video").await?;

        let outcome = harness.pipeline.process(&record).await?;
        assert_eq!(outcome.job_id, record.job_id);
        assert_eq!(outcome.frames, 7);
        assert_eq!(
            outcome.video_url,
            format!("http://localhost:8000/outputs/{}.mp4", record.job_id)
        );
        assert_eq!(std::fs::read(&outcome.output_path)?, b"annotated");

        let requests = harness
            .tracker
            .requests
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, format!("track-{}", record.job_id));
        assert!(requests[0].reuse_run);
        assert_eq!(requests[0].source, record.path);

        let metrics = harness.pipeline.metrics().render()?;
        assert!(metrics.contains("pipeline_jobs_total{outcome=\"completed\"} 1"));
        assert_eq!(harness.pipeline.metrics().snapshot().active_jobs, 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_run_skips_transcoding() -> anyhow::Result<()> {
        let harness = harness(RunLayout::Nothing, DiscoveryMode::Token).await?;
        let record = upload(&harness.pipeline, b"video").await?;

        let err = harness.pipeline.process(&record).await.err();
        assert!(matches!(err, Some(PipelineError::NoRunFound { .. })));
        assert_eq!(harness.transcoder.calls.load(Ordering::SeqCst), 0);
        assert!(!harness.pipeline.layout().output_path(record.job_id).exists());
        Ok(())
    }

    #[tokio::test]
    async fn run_without_video_is_reported() -> anyhow::Result<()> {
        let harness = harness(RunLayout::WithoutVideo, DiscoveryMode::Token).await?;
        let record = upload(&harness.pipeline, b"video").await?;

        let err = harness.pipeline.process(&record).await.err();
        assert!(matches!(err, Some(PipelineError::ArtifactNotFound { .. })));
        assert_eq!(harness.transcoder.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn latest_discovery_uses_the_shared_prefix() -> anyhow::Result<()> {
        let harness = harness(RunLayout::WithVideo, DiscoveryMode::Latest).await?;
        let record = upload(&harness.pipeline, b"video").await?;

        let outcome = harness.pipeline.process(&record).await?;
        assert!(outcome.output_path.is_file());
        let requests = harness
            .tracker
            .requests
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .clone();
        assert_eq!(requests[0].name, "track");
        assert!(!requests[0].reuse_run);
        Ok(())
    }

    #[tokio::test]
    async fn identical_uploads_get_distinct_outputs() -> anyhow::Result<()> {
        let harness = harness(RunLayout::WithVideo, DiscoveryMode::Token).await?;
        let first = upload(&harness.pipeline, b"same").await?;
        let second = upload(&harness.pipeline, b"same").await?;

        let a = harness.pipeline.process(&first).await?;
        let b = harness.pipeline.process(&second).await?;
        assert_ne!(a.video_url, b.video_url);
        assert!(a.output_path.is_file());
        assert!(b.output_path.is_file());
        Ok(())
    }

    #[tokio::test]
    async fn process_file_imports_local_video() -> anyhow::Result<()> {
        let harness = harness(RunLayout::WithVideo, DiscoveryMode::Token).await?;
        let source = harness.pipeline.layout().uploads_dir().join("../local.mp4");
        std::fs::write(&source, b"local")?;

        let outcome = harness.pipeline.process_file(&source).await?;
        assert!(harness.pipeline.layout().upload_path(outcome.job_id).is_file());
        assert_eq!(harness.pipeline.metrics().snapshot().upload_bytes_total, 5);
        Ok(())
    }
}
