use std::time::Duration;

use pulse_core::{KeepaliveConfig, ReconnectConfig, SessionOptions};
use serde::{Deserialize, Serialize};

/// Default host for the feed server
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default port for the feed server
pub const DEFAULT_PORT: u16 = pulse_server::DEFAULT_PORT;
/// Default feed endpoint watched by the session
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8000/ws";

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPulseConfig {
    #[serde(default)]
    pub server: RawServerSection,

    #[serde(default)]
    pub session: RawSessionSection,
}

/// Server section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Milliseconds between broadcast samples
    pub interval_ms: Option<u64>,
}

/// Session section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionSection {
    pub url: Option<String>,
    pub auto_connect: Option<bool>,
    pub initial_delay_ms: Option<u64>,
    pub keepalive_ms: Option<u64>,
    pub reconnect_base_ms: Option<u64>,
    pub reconnect_cap_ms: Option<u64>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PulseConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub session: SessionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub interval_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            interval_ms: 1000,
        }
    }
}

impl ServerSection {
    /// Feed server configuration for these settings
    pub fn to_server_config(&self) -> pulse_server::ServerConfig {
        pulse_server::ServerConfig::new(self.host.clone(), self.port)
            .with_interval(Duration::from_millis(self.interval_ms.max(1)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    pub url: String,
    pub auto_connect: bool,
    pub initial_delay_ms: u64,
    pub keepalive_ms: u64,
    pub reconnect_base_ms: u64,
    pub reconnect_cap_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            auto_connect: true,
            initial_delay_ms: 0,
            keepalive_ms: 1000,
            reconnect_base_ms: 1000,
            reconnect_cap_ms: 30_000,
        }
    }
}

impl SessionSection {
    /// Session options for these settings
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            auto_connect: self.auto_connect,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            keepalive: KeepaliveConfig {
                interval: Duration::from_millis(self.keepalive_ms.max(1)),
            },
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(self.reconnect_base_ms.max(1)),
                max_delay: Duration::from_millis(self.reconnect_cap_ms.max(1)),
            },
        }
    }
}
