//! Error types for pulse-core

use thiserror::Error;

/// Errors reported by a socket handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Socket is not open")]
    NotOpen,

    #[error("Socket is closed")]
    Closed,

    #[error("Failed to send on socket: {0}")]
    SendFailed(String),
}

/// Errors decoding an inbound payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Parse error: {message}")]
    Parse { message: String },
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

/// Error type returned by inbound payload handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
