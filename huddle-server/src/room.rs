//! The chat room: membership registry and broadcast coordinator
//!
//! The room runs as a single task that owns the registry outright. Every
//! join, leave and broadcast is one event pulled off the room inbox and
//! handled to completion before the next, so broadcasts always see a
//! consistent membership set and no lock is needed.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ServerError;
use crate::ws::{Envelope, SessionHandle, SessionId};

/// Default period of the liveness sweep
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest sweep period accepted; smaller values are raised to it
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Default number of events the room inbox holds before senders wait
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Room tuning
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// How often every member is sent a PING
    pub sweep_interval: Duration,
    /// Capacity of the room inbox
    pub inbox_capacity: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

#[derive(Debug)]
enum RoomEvent {
    Join {
        member: SessionHandle,
        ack: oneshot::Sender<()>,
    },
    Leave {
        id: SessionId,
        ack: oneshot::Sender<bool>,
    },
    Envelope(Envelope),
    Members {
        reply: oneshot::Sender<Vec<SessionId>>,
    },
}

/// Single shared room
pub struct Room {
    members: HashMap<SessionId, SessionHandle>,
    inbox: mpsc::Receiver<RoomEvent>,
    sweep_interval: Duration,
    shutdown: CancellationToken,
}

impl Room {
    /// Create a room with an empty registry, without starting it
    ///
    /// A `sweep_interval` below [`MIN_SWEEP_INTERVAL`] is raised to it.
    pub fn new(config: RoomConfig, shutdown: CancellationToken) -> (Self, RoomHandle) {
        let (tx, rx) = mpsc::channel(config.inbox_capacity.max(1));
        let room = Self {
            members: HashMap::new(),
            inbox: rx,
            sweep_interval: config.sweep_interval.max(MIN_SWEEP_INTERVAL),
            shutdown,
        };
        (room, RoomHandle { tx })
    }

    /// Create a room and run it on its own task
    pub fn spawn(config: RoomConfig, shutdown: CancellationToken) -> RoomHandle {
        let (room, handle) = Self::new(config, shutdown);
        tokio::spawn(room.run());
        handle
    }

    /// Process events until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("room started");

        let start = Instant::now() + self.sweep_interval;
        let mut sweep = tokio::time::interval_at(start, self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = sweep.tick() => self.liveness_sweep(),
                event = self.inbox.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }

        info!(total_members = self.len(), "room stopped");
    }

    fn handle_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Join { member, ack } => {
                self.on_join(member);
                let _ = ack.send(());
            }
            RoomEvent::Leave { id, ack } => {
                let removed = self.on_leave(id);
                let _ = ack.send(removed);
            }
            RoomEvent::Envelope(envelope) => self.on_envelope(envelope),
            RoomEvent::Members { reply } => {
                let _ = reply.send(self.members.keys().copied().collect());
            }
        }
    }

    /// Register a member and announce it to everyone, itself included
    ///
    /// A repeated id replaces the stored handle and is announced again.
    pub fn on_join(&mut self, member: SessionHandle) {
        let id = member.id();
        let join = Envelope::join(member.display_name());
        self.members.insert(id, member);

        info!(session_id = %id, total_members = self.len(), "client joined room");
        self.broadcast(&join);
    }

    /// Remove a member and announce it to the remaining members
    ///
    /// Returns `false`, with no broadcast, if the id was not registered.
    pub fn on_leave(&mut self, id: SessionId) -> bool {
        let Some(member) = self.members.remove(&id) else {
            debug!(session_id = %id, "leave for unknown session ignored");
            return false;
        };

        info!(session_id = %id, total_members = self.len(), "client left room");
        self.broadcast(&Envelope::leave(member.display_name()));
        true
    }

    /// Relay chat and typing envelopes verbatim to every member
    ///
    /// The sender receives its own envelope back. Other kinds are ignored.
    pub fn on_envelope(&self, envelope: Envelope) {
        match envelope {
            Envelope::Message(_) | Envelope::Typing(_) => {
                self.broadcast(&envelope);
            }
            Envelope::Ping
            | Envelope::Pong
            | Envelope::Close
            | Envelope::Error(_)
            | Envelope::Join(_)
            | Envelope::Leave(_) => {
                debug!(kind = %envelope.kind(), "room ignoring envelope");
            }
        }
    }

    /// Send one PING to every member
    ///
    /// Members that never answer are not evicted here; they leave when
    /// their socket fails.
    pub fn liveness_sweep(&self) {
        let before = self.len();
        let sent = self.broadcast(&Envelope::Ping);
        debug!(
            members_before = before,
            members_after = self.len(),
            pings_queued = sent,
            "liveness sweep"
        );
    }

    /// Number of registered members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Queue an envelope on every member, returning how many accepted it
    fn broadcast(&self, envelope: &Envelope) -> usize {
        let mut delivered = 0;
        for (id, member) in &self.members {
            if member.deliver(envelope.clone()) {
                delivered += 1;
            }
            debug!(session_id = %id, kind = %envelope.kind(), "sent envelope to client");
        }
        delivered
    }
}

/// Cloneable sender side of the room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    tx: mpsc::Sender<RoomEvent>,
}

impl RoomHandle {
    /// Register a session, returning once the room has announced it
    pub async fn join(&self, member: SessionHandle) -> Result<(), ServerError> {
        let (ack, rx) = oneshot::channel();
        self.send(RoomEvent::Join { member, ack }).await?;
        rx.await.map_err(|_| ServerError::RoomClosed)
    }

    /// Deregister a session, returning once the room has processed it
    ///
    /// Resolves to whether the session was registered.
    pub async fn leave(&self, id: SessionId) -> Result<bool, ServerError> {
        let (ack, rx) = oneshot::channel();
        self.send(RoomEvent::Leave { id, ack }).await?;
        rx.await.map_err(|_| ServerError::RoomClosed)
    }

    /// Hand an envelope to the room without waiting for it to be processed
    pub async fn dispatch(&self, envelope: Envelope) -> Result<(), ServerError> {
        self.send(RoomEvent::Envelope(envelope)).await
    }

    /// Snapshot of registered session ids
    pub async fn members(&self) -> Result<Vec<SessionId>, ServerError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomEvent::Members { reply }).await?;
        rx.await.map_err(|_| ServerError::RoomClosed)
    }

    pub async fn member_count(&self) -> Result<usize, ServerError> {
        Ok(self.members().await?.len())
    }

    /// Resolves once the room task has stopped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    async fn send(&self, event: RoomEvent) -> Result<(), ServerError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ServerError::RoomClosed)
    }
}
