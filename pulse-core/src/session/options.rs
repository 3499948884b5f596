//! Options for a session start cycle

use std::time::Duration;

use crate::keepalive::KeepaliveConfig;
use crate::reconnect::ReconnectConfig;

/// Options passed to [`SessionManager::start`](super::SessionManager::start)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Connect as soon as the session starts
    pub auto_connect: bool,
    /// Delay before the first automatic connection attempt
    pub initial_delay: Duration,
    pub keepalive: KeepaliveConfig,
    pub reconnect: ReconnectConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_connect: true,
            initial_delay: Duration::ZERO,
            keepalive: KeepaliveConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SessionOptions {
    /// Options for a session that waits for an explicit connect
    pub fn manual() -> Self {
        Self {
            auto_connect: false,
            ..Self::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}
