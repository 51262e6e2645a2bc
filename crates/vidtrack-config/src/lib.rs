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

//! File- and environment-backed configuration for the vidtrack service.
//!
//! Layout: `model.rs` (typed sections), `defaults.rs` (baseline values),
//! `loader.rs` (YAML + env layering), `validate.rs` (post-load checks).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_CONFIG_PATH};
pub use model::{
    DiscoveryMode, InferenceConfig, LogOutput, LoggingSettings, PipelineConfig, ServerConfig,
    ServiceConfig, StorageConfig, TranscodeConfig,
};
