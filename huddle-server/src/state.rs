//! Shared application state for the huddle server

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::room::{Room, RoomConfig, RoomHandle};
use crate::{ServerConfig, ServerError};

/// Shared application state accessible by all handlers
pub struct AppState {
    /// Handle to the single chat room
    pub room: RoomHandle,
    /// Server configuration
    pub config: ServerConfig,
    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
    /// Limits the number of live sessions
    sessions: Arc<Semaphore>,
}

impl AppState {
    /// Create state and start the room
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let shutdown = CancellationToken::new();
        let room = Room::spawn(
            RoomConfig {
                sweep_interval: config.sweep_interval,
                ..Default::default()
            },
            shutdown.child_token(),
        );

        Self {
            room,
            sessions: Arc::new(Semaphore::new(config.max_sessions)),
            config,
            shutdown,
        }
    }

    /// Reserve a slot for a new session
    ///
    /// The slot is released when the permit is dropped.
    pub fn admit(&self) -> Result<OwnedSemaphorePermit, ServerError> {
        Arc::clone(&self.sessions)
            .try_acquire_owned()
            .map_err(|e| ServerError::Spawn(e.to_string()))
    }
}
