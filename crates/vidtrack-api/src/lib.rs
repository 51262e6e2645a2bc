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

//! HTTP surface for vidtrack: upload intake, static outputs, health, and metrics.
//! Layout: `http/` (router, handlers, middleware), `models.rs` (wire types),
//! `state.rs` (shared handler state), `error.rs` (server lifecycle errors).

pub mod error;
mod http;
pub mod models;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use models::{ErrorBody, HealthResponse, UploadResponse};
