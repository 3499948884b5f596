//! Reconnect scheduling with capped exponential backoff

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl ReconnectConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// `min(base * 2^attempt, max)`, saturating for large attempt counts.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }
}

/// Tracks the reconnect attempt counter of a session.
///
/// Retries are unbounded; only stopping the session ends them.
#[derive(Debug, Clone)]
pub struct ReconnectScheduler {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectScheduler {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Current attempt counter
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&self) -> Duration {
        self.config.delay_for_attempt(self.attempt)
    }

    /// Record that a scheduled reconnect fired, returning the new counter
    pub fn advance(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.attempt
    }

    /// Reset after a successful open
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
