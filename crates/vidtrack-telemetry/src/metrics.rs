//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the handful of counters that describe upload and pipeline health.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

const STAGE_BUCKETS: &[f64] = &[0.05, 0.25, 1.0, 5.0, 15.0, 60.0, 180.0, 600.0, 1_800.0];

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    pipeline_jobs_total: IntCounterVec,
    pipeline_stage_seconds: HistogramVec,
    pipeline_active_jobs: IntGauge,
    upload_bytes_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs currently holding a pipeline slot.
    pub active_jobs: i64,
    /// Bytes persisted from uploads since start.
    pub upload_bytes_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )
        .map_err(|source| collector("http_requests_total", source))?;
        let pipeline_jobs_total = IntCounterVec::new(
            Opts::new("pipeline_jobs_total", "Pipeline jobs finished by outcome"),
            &["outcome"],
        )
        .map_err(|source| collector("pipeline_jobs_total", source))?;
        let pipeline_stage_seconds = HistogramVec::new(
            HistogramOpts::new("pipeline_stage_seconds", "Wall time spent per pipeline stage")
                .buckets(STAGE_BUCKETS.to_vec()),
            &["stage"],
        )
        .map_err(|source| collector("pipeline_stage_seconds", source))?;
        let pipeline_active_jobs = IntGauge::with_opts(Opts::new(
            "pipeline_active_jobs",
            "Jobs currently inside the pipeline",
        ))
        .map_err(|source| collector("pipeline_active_jobs", source))?;
        let upload_bytes_total = IntCounter::with_opts(Opts::new(
            "upload_bytes_total",
            "Bytes persisted from uploaded videos",
        ))
        .map_err(|source| collector("upload_bytes_total", source))?;

        register(&registry, "http_requests_total", http_requests_total.clone())?;
        register(&registry, "pipeline_jobs_total", pipeline_jobs_total.clone())?;
        register(
            &registry,
            "pipeline_stage_seconds",
            pipeline_stage_seconds.clone(),
        )?;
        register(&registry, "pipeline_active_jobs", pipeline_active_jobs.clone())?;
        register(&registry, "upload_bytes_total", upload_bytes_total.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                pipeline_jobs_total,
                pipeline_stage_seconds,
                pipeline_active_jobs,
                upload_bytes_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a finished pipeline job.
    pub fn inc_pipeline_job(&self, outcome: &str) {
        self.inner
            .pipeline_jobs_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record the duration of one pipeline stage.
    pub fn observe_stage(&self, stage: &str, elapsed: Duration) {
        self.inner
            .pipeline_stage_seconds
            .with_label_values(&[stage])
            .observe(elapsed.as_secs_f64());
    }

    /// Mark a job as entering the pipeline.
    pub fn job_started(&self) {
        self.inner.pipeline_active_jobs.inc();
    }

    /// Mark a job as leaving the pipeline.
    pub fn job_finished(&self) {
        self.inner.pipeline_active_jobs.dec();
    }

    /// Add persisted upload bytes.
    pub fn add_upload_bytes(&self, bytes: u64) {
        self.inner.upload_bytes_total.inc_by(bytes);
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_jobs: self.inner.pipeline_active_jobs.get(),
            upload_bytes_total: self.inner.upload_bytes_total.get(),
        }
    }
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/upload", 200);
        metrics.inc_pipeline_job("completed");
        metrics.observe_stage("transcode", Duration::from_millis(1_500));
        metrics.job_started();
        metrics.job_started();
        metrics.job_finished();
        metrics.add_upload_bytes(4_096);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_jobs, 1);
        assert_eq!(snapshot.upload_bytes_total, 4_096);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("pipeline_jobs_total{outcome=\"completed\"} 1"));
        assert!(rendered.contains("pipeline_stage_seconds_bucket"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.add_upload_bytes(10);
        assert_eq!(second.snapshot().upload_bytes_total, 0);
        Ok(())
    }
}
