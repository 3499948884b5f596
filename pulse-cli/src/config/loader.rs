use super::types::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_URL, PulseConfig, RawPulseConfig, RawServerSection,
    RawSessionSection, ServerSection, SessionSection,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<PulseConfig> {
        Self::load_layers(
            Self::user_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Load a user layer overlaid by a project layer; missing files are skipped
    pub fn load_layers(user: Option<&Path>, project: &Path) -> Result<PulseConfig> {
        let mut raw = RawPulseConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(user_path)?);
        }

        // Layer 2: Project config
        if project.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(project)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "pulse").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with PULSE_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("PULSE_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".pulse/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawPulseConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawPulseConfig, overlay: RawPulseConfig) -> RawPulseConfig {
        RawPulseConfig {
            server: RawServerSection {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
                interval_ms: overlay.server.interval_ms.or(base.server.interval_ms),
            },
            session: RawSessionSection {
                url: overlay.session.url.or(base.session.url),
                auto_connect: overlay.session.auto_connect.or(base.session.auto_connect),
                initial_delay_ms: overlay
                    .session
                    .initial_delay_ms
                    .or(base.session.initial_delay_ms),
                keepalive_ms: overlay.session.keepalive_ms.or(base.session.keepalive_ms),
                reconnect_base_ms: overlay
                    .session
                    .reconnect_base_ms
                    .or(base.session.reconnect_base_ms),
                reconnect_cap_ms: overlay
                    .session
                    .reconnect_cap_ms
                    .or(base.session.reconnect_cap_ms),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawPulseConfig) -> PulseConfig {
        let server_defaults = ServerSection::default();
        let session_defaults = SessionSection::default();
        PulseConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
                interval_ms: raw.server.interval_ms.unwrap_or(server_defaults.interval_ms),
            },
            session: SessionSection {
                url: raw.session.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
                auto_connect: raw
                    .session
                    .auto_connect
                    .unwrap_or(session_defaults.auto_connect),
                initial_delay_ms: raw
                    .session
                    .initial_delay_ms
                    .unwrap_or(session_defaults.initial_delay_ms),
                keepalive_ms: raw
                    .session
                    .keepalive_ms
                    .unwrap_or(session_defaults.keepalive_ms),
                reconnect_base_ms: raw
                    .session
                    .reconnect_base_ms
                    .unwrap_or(session_defaults.reconnect_base_ms),
                reconnect_cap_ms: raw
                    .session
                    .reconnect_cap_ms
                    .unwrap_or(session_defaults.reconnect_cap_ms),
            },
        }
    }
}
