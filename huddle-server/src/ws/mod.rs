//! WebSocket module for real-time communication

mod connection;
mod protocol;
mod session;

pub use connection::{ConnectParams, ws_handler};
pub use protocol::{
    ChatPayload, Envelope, EnvelopeKind, ErrorPayload, PresencePayload, ProtocolError,
    TypingPayload,
};
pub use session::{ReadOutcome, Session, SessionHandle, SessionId, SessionWriter};
