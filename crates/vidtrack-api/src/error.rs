//! Errors raised while building or hosting the HTTP server.

use std::net::SocketAddr;

use thiserror::Error;

/// Result alias for API server operations.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// Startup and serve failures of [`crate::ApiServer`].
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// A configured CORS origin is not a valid header value.
    #[error("invalid cors origin")]
    InvalidOrigin {
        /// Offending origin.
        origin: String,
    },
    /// The listener could not bind.
    #[error("failed to bind api listener")]
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The accept loop stopped with an error.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
