//! Per-connection session
//!
//! A session owns one socket. Its two halves run on separate tasks:
//! - the read loop decodes inbound frames and forwards them to the room
//! - the [`SessionWriter`] drains the session outbox onto the socket
//!
//! A blocked read therefore never stalls outbound broadcasts.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use axum::extract::ws::{CloseFrame, Message, close_code};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::ServerError;
use crate::room::RoomHandle;

use super::protocol::Envelope;

/// Opaque identity of a session, unique for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reference to a session, as stored by the room
///
/// Cloning is cheap. Delivery never blocks: when the outbox is full or the
/// session is gone the envelope is dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    name: Arc<OnceLock<String>>,
    outbox: mpsc::Sender<Envelope>,
}

impl SessionHandle {
    pub fn new(id: SessionId, name: Option<String>, outbox: mpsc::Sender<Envelope>) -> Self {
        let cell = OnceLock::new();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            let _ = cell.set(name);
        }
        Self {
            id,
            name: Arc::new(cell),
            outbox,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Display name, or an empty string if the client never set one
    pub fn display_name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or_default()
    }

    /// Set the display name if it is still unset
    ///
    /// Returns `true` if this call set the name.
    pub fn claim_name(&self, name: &str) -> bool {
        !name.is_empty() && self.name.set(name.to_string()).is_ok()
    }

    /// Queue an envelope for this session's socket
    pub fn deliver(&self, envelope: Envelope) -> bool {
        match self.outbox.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(envelope)) => {
                warn!(
                    session_id = %self.id,
                    kind = %envelope.kind(),
                    "session outbox full, dropping envelope"
                );
                false
            }
            Err(TrySendError::Closed(envelope)) => {
                debug!(
                    session_id = %self.id,
                    kind = %envelope.kind(),
                    "session outbox closed, dropping envelope"
                );
                false
            }
        }
    }
}

/// Why a session's read loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Peer sent a WebSocket close frame
    ClosedByPeer,
    /// Peer sent a CLOSE envelope
    CloseRequested,
    /// Socket stream ended without a close frame
    StreamEnded,
    /// Socket read failed
    ReadError(String),
    /// Session was stopped locally
    Stopped,
    /// The room is no longer accepting events
    RoomClosed,
}

/// Server-side state for one connected client
pub struct Session {
    handle: SessionHandle,
    stop: CancellationToken,
}

impl Session {
    /// Create a session and the writer that owns its outbox
    ///
    /// `stop` is cancelled by [`Session::stop`]; pass a child of the server
    /// shutdown token so shutdown also stops the session.
    pub fn new(
        name: Option<String>,
        buffer: usize,
        stop: CancellationToken,
    ) -> (Self, SessionWriter) {
        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let session = Self {
            handle: SessionHandle::new(id, name, tx),
            stop: stop.clone(),
        };
        let writer = SessionWriter {
            id,
            outbox: rx,
            stop,
        };
        (session, writer)
    }

    pub fn id(&self) -> SessionId {
        self.handle.id
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Answer a client PING on this session only
    pub fn on_ping(&self) {
        self.handle.deliver(Envelope::Pong);
    }

    /// Close the socket and end both halves of the session
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Read frames until the socket ends, then report why
    ///
    /// Malformed frames are dropped individually. Only well-formed envelopes
    /// reach the room.
    pub async fn read_loop<R, E>(&self, mut stream: R, room: &RoomHandle) -> ReadOutcome
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let id = self.id();

        loop {
            let frame = tokio::select! {
                _ = self.stop.cancelled() => return ReadOutcome::Stopped,
                frame = stream.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let envelope = match Envelope::decode(&text) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            debug!(session_id = %id, error = %e, "dropping frame");
                            continue;
                        }
                    };
                    if let Some(outcome) = self.on_envelope(envelope, room).await {
                        return outcome;
                    }
                }
                Some(Ok(Message::Close(_))) => return ReadOutcome::ClosedByPeer,
                Some(Ok(_)) => {
                    // Binary frames and transport-level ping/pong
                }
                Some(Err(e)) => return ReadOutcome::ReadError(e.to_string()),
                None => return ReadOutcome::StreamEnded,
            }
        }
    }

    async fn on_envelope(&self, envelope: Envelope, room: &RoomHandle) -> Option<ReadOutcome> {
        match &envelope {
            Envelope::Ping => {
                self.on_ping();
                return None;
            }
            Envelope::Pong => {
                trace!(session_id = %self.id(), "pong");
                return None;
            }
            Envelope::Close => return Some(ReadOutcome::CloseRequested),
            Envelope::Message(payload) => {
                self.handle.claim_name(&payload.from);
            }
            Envelope::Typing(payload) => {
                self.handle.claim_name(&payload.from);
            }
            Envelope::Error(_) | Envelope::Join(_) | Envelope::Leave(_) => {}
        }

        match room.dispatch(envelope).await {
            Ok(()) => None,
            Err(_) => Some(ReadOutcome::RoomClosed),
        }
    }
}

/// Outbound half of a session: drains the outbox onto the socket
pub struct SessionWriter {
    id: SessionId,
    outbox: mpsc::Receiver<Envelope>,
    stop: CancellationToken,
}

impl SessionWriter {
    /// Run the writer on its own task
    pub fn spawn<S>(self, sink: S) -> JoinHandle<()>
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: fmt::Display + Send,
    {
        tokio::spawn(self.run(sink))
    }

    /// Write queued envelopes until stopped or every handle is dropped,
    /// then flush what is still queued and send a close frame
    pub async fn run<S>(mut self, mut sink: S)
    where
        S: Sink<Message> + Unpin,
        S::Error: fmt::Display,
    {
        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                next = self.outbox.recv() => match next {
                    Some(envelope) => {
                        if let Err(e) = write_envelope(&mut sink, &envelope).await {
                            warn!(
                                session_id = %self.id,
                                kind = %envelope.kind(),
                                error = %e,
                                "failed to write envelope"
                            );
                        }
                    }
                    None => break,
                },
            }
        }

        // Nothing new is accepted once stopped; envelopes already queued
        // are still written until the first write fails.
        self.outbox.close();
        while let Ok(envelope) = self.outbox.try_recv() {
            if let Err(e) = write_envelope(&mut sink, &envelope).await {
                debug!(session_id = %self.id, error = %e, "abandoning queued envelopes");
                break;
            }
        }

        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: Cow::Borrowed(""),
        };
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            debug!(session_id = %self.id, error = %e, "close frame not sent");
        }
        let _ = sink.close().await;
    }
}

/// Serialize and write a single envelope
async fn write_envelope<S>(sink: &mut S, envelope: &Envelope) -> Result<(), ServerError>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let text = envelope.encode()?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| ServerError::Connection(e.to_string()))
}
