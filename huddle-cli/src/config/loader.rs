use super::types::{
    DEFAULT_HOST, DEFAULT_MAX_SESSIONS, DEFAULT_PORT, DEFAULT_SESSION_BUFFER,
    DEFAULT_SWEEP_INTERVAL_SECS, HuddleConfig, RawHuddleConfig, RawRoomConfig, RawServerConfig,
    RoomSection, ServerSection,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<HuddleConfig> {
        let mut raw = RawHuddleConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && let Some(user_config) = Self::read_raw(&user_path)?
        {
            raw = Self::merge_raw(raw, user_config);
        }

        // Layer 2: Project config
        if let Some(project_config) = Self::read_raw(&Self::project_config_path())? {
            raw = Self::merge_raw(raw, project_config);
        }

        // Convert to final config with defaults applied
        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "huddle").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with HUDDLE_PROJECT_CONFIG_DIR env var (useful for isolated e2e tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("HUDDLE_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".huddle/config.toml")
        }
    }

    /// Read one config layer, `None` if the file does not exist
    fn read_raw(path: &Path) -> Result<Option<RawHuddleConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawHuddleConfig, overlay: RawHuddleConfig) -> RawHuddleConfig {
        RawHuddleConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
                static_dir: overlay.server.static_dir.or(base.server.static_dir),
                max_sessions: overlay.server.max_sessions.or(base.server.max_sessions),
            },
            room: RawRoomConfig {
                sweep_interval_secs: overlay
                    .room
                    .sweep_interval_secs
                    .or(base.room.sweep_interval_secs),
                session_buffer: overlay.room.session_buffer.or(base.room.session_buffer),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawHuddleConfig) -> HuddleConfig {
        HuddleConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
                static_dir: raw.server.static_dir,
                max_sessions: raw.server.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS),
            },
            room: RoomSection {
                sweep_interval_secs: raw
                    .room
                    .sweep_interval_secs
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
                session_buffer: raw.room.session_buffer.unwrap_or(DEFAULT_SESSION_BUFFER),
            },
        }
    }

    /// Load a single config file with defaults applied (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<HuddleConfig> {
        let raw = Self::read_raw(path)?.unwrap_or_default();
        Ok(Self::finalize(raw))
    }
}
