//! Keep-alive probing for open sessions
//!
//! The probe is one-way: no reply is expected and a missing reply is not
//! treated as a liveness failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::timer::{TimerKind, TimerSet};
use crate::transport::SocketHandle;

/// Literal text sent as the keep-alive probe
pub const PING_PROBE: &str = "ping";

/// Keep-alive configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// Time between probes
    pub interval: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
        }
    }
}

/// Sends the keep-alive probe on the session's ping timer
#[derive(Debug)]
pub struct Keepalive {
    config: KeepaliveConfig,
    probes_sent: u64,
}

impl Keepalive {
    pub fn new(config: KeepaliveConfig) -> Self {
        Self {
            config,
            probes_sent: 0,
        }
    }

    /// Arm the ping timer, replacing a running one
    pub fn start(&self, timers: &mut TimerSet) {
        timers.schedule_repeating(TimerKind::Ping, self.config.interval);
    }

    /// Disarm the ping timer
    pub fn stop(&self, timers: &mut TimerSet) {
        timers.cancel(TimerKind::Ping);
    }

    pub fn is_running(&self, timers: &TimerSet) -> bool {
        timers.is_armed(TimerKind::Ping)
    }

    /// Send one probe; a failed write is logged and otherwise ignored
    pub fn probe(&mut self, handle: &dyn SocketHandle) {
        match handle.send_raw(PING_PROBE.to_string()) {
            Ok(()) => self.probes_sent += 1,
            Err(e) => debug!("Ping send failed: {}", e),
        }
    }

    pub fn probes_sent(&self) -> u64 {
        self.probes_sent
    }
}
