#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Upload-to-playable-video pipeline: storage layout, tracker invocation,
//! run discovery, transcoding, and URL composition.

pub mod error;
pub mod inference;
pub mod locator;
pub mod pipeline;
mod process;
pub mod response;
pub mod storage;
pub mod tools;
pub mod transcode;

pub use error::{PipelineError, PipelineResult};
pub use inference::{CommandTracker, InferenceReport, TrackRequest, TrackingEngine};
pub use locator::{ProducedArtifact, RunDirectory, RunSelector, find_artifact, locate_run};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use response::ResponseComposer;
pub use storage::{JobId, StorageLayout, UploadRecord, UploadSink};
pub use tools::{resolve_model, resolve_program};
pub use transcode::{FfmpegTranscoder, TranscodeReport, Transcoder};
