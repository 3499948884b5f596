//! Session status, phase and event types

use serde::{Deserialize, Serialize};

/// Connection status reported to collaborators.
///
/// Mirrors the ready-state of the underlying socket (`0..=3`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closing,
    #[default]
    Closed,
}

impl ConnectionStatus {
    /// Numeric ready-state of this status
    pub fn ready_state(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }

    /// Status for a numeric ready-state, if it is one
    pub fn from_ready_state(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Connecting),
            1 => Some(Self::Open),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Started without auto-connect, waiting for an explicit connect
    Idle,
    /// Waiting out the initial delay before the first attempt
    Delaying,
    /// A handle exists and has not opened yet
    Connecting,
    /// The handle is open
    Open,
    /// The handle reported it is closing
    Closing,
    /// The handle closed, a reconnect is scheduled
    Backoff,
    /// The session was stopped
    Stopped,
}

/// Events emitted by the session manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The reported connection status changed
    StatusChanged { status: ConnectionStatus },
    /// A reconnect attempt was scheduled
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// An inbound payload could not be decoded
    ParseFailure { error: String },
    /// The inbound handler returned an error or panicked
    HandlerFailed { error: String },
    /// The session was stopped
    Stopped,
}
