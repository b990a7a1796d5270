//! WebSocket connection handling
//!
//! Turns an upgraded socket into a registered session and tears it down
//! again when the socket goes away.

use std::borrow::Cow;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::AppState;

use super::session::Session;

/// Query parameters accepted on `/ws`
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Display name for the new session
    #[serde(default)]
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.name))
}

/// Handle a WebSocket connection from admission to teardown
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, name: Option<String>) {
    let _permit = match state.admit() {
        Ok(permit) => permit,
        Err(e) => {
            warn!(error = %e, "rejecting WebSocket client");
            let frame = CloseFrame {
                code: close_code::AGAIN,
                reason: Cow::Borrowed("server is at capacity"),
            };
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    let (session, writer) = Session::new(
        name,
        state.config.session_buffer,
        state.shutdown.child_token(),
    );
    let session_id = session.id();
    let (sender, receiver) = socket.split();
    let writer = writer.spawn(sender);

    // The join must be acknowledged before any of this client's frames are
    // forwarded, so its own join is ordered ahead of its messages.
    if let Err(e) = state.room.join(session.handle()).await {
        error!(session_id = %session_id, error = %e, "failed to join room");
        session.stop();
        let _ = writer.await;
        return;
    }

    info!(session_id = %session_id, "WebSocket client connected");

    let outcome = session.read_loop(receiver, &state.room).await;

    info!(session_id = %session_id, ?outcome, "closing connection");

    match state.room.leave(session_id).await {
        Ok(true) => {}
        Ok(false) => debug!(session_id = %session_id, "session was not registered"),
        Err(e) => debug!(session_id = %session_id, error = %e, "leave not processed"),
    }
    session.stop();
    if let Err(e) = writer.await {
        error!(session_id = %session_id, error = %e, "session writer panicked");
    }

    info!(session_id = %session_id, "WebSocket client disconnected");
}
