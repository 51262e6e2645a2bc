//! Shared state handed to every handler.

use vidtrack_pipeline::Pipeline;
use vidtrack_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) pipeline: Pipeline,
}

impl ApiState {
    pub(crate) const fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        self.pipeline.metrics()
    }
}
