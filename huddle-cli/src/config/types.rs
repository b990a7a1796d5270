use std::path::PathBuf;
use std::time::Duration;

use huddle_server::ServerConfig;
use serde::{Deserialize, Serialize};

pub use huddle_server::{DEFAULT_HOST, DEFAULT_MAX_SESSIONS, DEFAULT_PORT, DEFAULT_SESSION_BUFFER};

/// Default liveness sweep period in seconds
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawHuddleConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub room: RawRoomConfig,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    /// Host to bind to
    pub host: Option<String>,

    /// Port for the huddle server
    pub port: Option<u16>,

    /// Directory of the pre-built client bundle
    pub static_dir: Option<PathBuf>,

    /// Maximum number of concurrent sessions
    pub max_sessions: Option<usize>,
}

/// Room config as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRoomConfig {
    /// Seconds between liveness sweeps
    pub sweep_interval_secs: Option<u64>,

    /// Outbound envelopes buffered per session
    pub session_buffer: Option<usize>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HuddleConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub room: RoomSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
    pub max_sessions: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            static_dir: None,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSection {
    pub sweep_interval_secs: u64,
    pub session_buffer: usize,
}

impl Default for RoomSection {
    fn default() -> Self {
        Self {
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            session_buffer: DEFAULT_SESSION_BUFFER,
        }
    }
}

impl HuddleConfig {
    /// Build the server configuration
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            sweep_interval: Duration::from_secs(self.room.sweep_interval_secs.max(1)),
            max_sessions: self.server.max_sessions,
            session_buffer: self.room.session_buffer,
            static_dir: self.server.static_dir.clone(),
        }
    }
}
