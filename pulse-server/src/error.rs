//! Server error types

use thiserror::Error;

/// Errors that can occur in the feed server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Configured CORS origin is not a valid header value
    #[error("invalid allowed origin: {0}")]
    InvalidOrigin(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
