//! huddle-server - WebSocket chat relay for a single room
//!
//! Clients connect on `/ws`, are registered with the shared [`room::Room`],
//! and every chat, typing, join and leave event is fanned out to all current
//! members.

mod error;
pub mod http;
pub mod room;
mod state;
pub mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

pub use error::ServerError;
pub use http::create_router;
pub use state::AppState;

/// The main huddle server
pub struct HuddleServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HuddleServer {
    /// Create a new server and start its room
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let state = Arc::new(AppState::new(config.clone()));
        Self { config, state }
    }

    /// Create a server with custom state (for testing)
    pub fn with_state(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address, until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("huddle server listening on {}", addr);

        let shutdown = self.state.shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
        });

        self.run_with_listener(listener).await
    }

    /// Serve on an already-bound listener until the shutdown token is
    /// cancelled
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let shutdown = self.state.shutdown.clone();
        let router = create_router(Arc::clone(&self.state));

        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServerError::Internal(e.to_string()));

        // Also covers serve errors, so the room never outlives the server
        self.state.shutdown.cancel();
        tracing::info!("huddle server stopped");

        result
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Period of the room liveness sweep
    pub sweep_interval: Duration,
    /// Maximum number of concurrent sessions
    pub max_sessions: usize,
    /// Outbound envelopes buffered per session before drops
    pub session_buffer: usize,
    /// Directory served for paths not matched by the API
    pub static_dir: Option<PathBuf>,
}

/// Default port for the huddle server
pub const DEFAULT_PORT: u16 = 8080;
/// Default host for the huddle server
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default maximum number of concurrent sessions
pub const DEFAULT_MAX_SESSIONS: usize = 1024;
/// Default per-session outbox capacity
pub const DEFAULT_SESSION_BUFFER: usize = 64;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            sweep_interval: room::DEFAULT_SWEEP_INTERVAL,
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_buffer: DEFAULT_SESSION_BUFFER,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:8080")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn test_server_config_addr() {
        let config = ServerConfig::new("127.0.0.1", 9000);
        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.session_buffer, DEFAULT_SESSION_BUFFER);
    }

    #[tokio::test]
    async fn test_huddle_server_new() {
        let config = ServerConfig::default();
        let server = HuddleServer::new(config.clone());
        assert_eq!(server.config().addr(), config.addr());
        server.state().shutdown.cancel();
    }

    #[tokio::test]
    async fn test_huddle_server_with_state() {
        let config = ServerConfig::new("127.0.0.1", 9000);
        let state = Arc::new(AppState::new(config.clone()));
        let server = HuddleServer::with_state(config, Arc::clone(&state));
        assert_eq!(server.config().port, 9000);
        assert!(Arc::ptr_eq(&server.state(), &state));
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = HuddleServer::new(ServerConfig::new("127.0.0.1", port));
        let state = server.state();
        let err = server.run().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        state.shutdown.cancel();
    }
}
