//! WebSocket envelope protocol
//!
//! Every text frame on `/ws` carries exactly one JSON envelope:
//!
//! ```json
//! {"type": "MESSAGE", "payload": {"text": "hi", "from": "alice"}}
//! ```
//!
//! The payload shape is fixed by the `type` tag. PING, PONG and CLOSE carry
//! no payload and encode without the field.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminator of an envelope, as written in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Ping,
    Pong,
    Close,
    Error,
    Message,
    Typing,
    Join,
    Leave,
}

impl EnvelopeKind {
    /// All kinds, in wire order
    pub const ALL: [EnvelopeKind; 8] = [
        EnvelopeKind::Ping,
        EnvelopeKind::Pong,
        EnvelopeKind::Close,
        EnvelopeKind::Error,
        EnvelopeKind::Message,
        EnvelopeKind::Typing,
        EnvelopeKind::Join,
        EnvelopeKind::Leave,
    ];

    /// Wire name of this kind
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeKind::Ping => "PING",
            EnvelopeKind::Pong => "PONG",
            EnvelopeKind::Close => "CLOSE",
            EnvelopeKind::Error => "ERROR",
            EnvelopeKind::Message => "MESSAGE",
            EnvelopeKind::Typing => "TYPING",
            EnvelopeKind::Join => "JOIN",
            EnvelopeKind::Leave => "LEAVE",
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvelopeKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnvelopeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownType(s.to_string()))
    }
}

/// Payload of a MESSAGE envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Message body
    pub text: String,
    /// Display name of the sender
    pub from: String,
}

/// Payload of a TYPING envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    /// Display name of the typist
    pub from: String,
    /// Whether the user is currently typing
    #[serde(rename = "isTyping", alias = "is_typing")]
    pub is_typing: bool,
}

/// Payload of JOIN and LEAVE envelopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    /// Display name of the member who joined or left
    pub from: String,
}

/// Payload of an ERROR envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error description
    pub error: String,
}

/// A single wire message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Liveness probe
    Ping,
    /// Reply to a liveness probe
    Pong,
    /// Request to end the connection
    Close,
    /// Error report
    Error(ErrorPayload),
    /// Chat message
    Message(ChatPayload),
    /// Typing indicator
    Typing(TypingPayload),
    /// Member joined the room
    Join(PresencePayload),
    /// Member left the room
    Leave(PresencePayload),
}

/// Errors produced while decoding or encoding an envelope
///
/// Every decode variant means the frame is malformed and must be dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not a JSON object with a string `type`
    #[error("malformed envelope: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// `type` is not one of the known kinds
    #[error("malformed envelope: unknown type {0:?}")]
    UnknownType(String),

    /// Known kind that requires a payload arrived without one
    #[error("malformed envelope: {0} requires a payload")]
    MissingPayload(EnvelopeKind),

    /// Payload does not match the shape of its kind
    #[error("malformed envelope: invalid {kind} payload: {source}")]
    Payload {
        kind: EnvelopeKind,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failed
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Untyped first pass over a frame
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

impl Envelope {
    pub fn chat(text: impl Into<String>, from: impl Into<String>) -> Self {
        Envelope::Message(ChatPayload {
            text: text.into(),
            from: from.into(),
        })
    }

    pub fn typing(from: impl Into<String>, is_typing: bool) -> Self {
        Envelope::Typing(TypingPayload {
            from: from.into(),
            is_typing,
        })
    }

    pub fn join(from: impl Into<String>) -> Self {
        Envelope::Join(PresencePayload { from: from.into() })
    }

    pub fn leave(from: impl Into<String>) -> Self {
        Envelope::Leave(PresencePayload { from: from.into() })
    }

    pub fn error(error: impl Into<String>) -> Self {
        Envelope::Error(ErrorPayload {
            error: error.into(),
        })
    }

    /// The discriminator of this envelope
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Ping => EnvelopeKind::Ping,
            Envelope::Pong => EnvelopeKind::Pong,
            Envelope::Close => EnvelopeKind::Close,
            Envelope::Error(_) => EnvelopeKind::Error,
            Envelope::Message(_) => EnvelopeKind::Message,
            Envelope::Typing(_) => EnvelopeKind::Typing,
            Envelope::Join(_) => EnvelopeKind::Join,
            Envelope::Leave(_) => EnvelopeKind::Leave,
        }
    }

    /// Serialize to the JSON wire form
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Parse a JSON frame
    ///
    /// A missing or `null` payload is accepted for PING, PONG and CLOSE, and
    /// any payload sent with them is ignored.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
        let kind: EnvelopeKind = raw.kind.parse()?;

        let envelope = match kind {
            EnvelopeKind::Ping => Envelope::Ping,
            EnvelopeKind::Pong => Envelope::Pong,
            EnvelopeKind::Close => Envelope::Close,
            EnvelopeKind::Error => Envelope::Error(payload(kind, raw.payload)?),
            EnvelopeKind::Message => Envelope::Message(payload(kind, raw.payload)?),
            EnvelopeKind::Typing => Envelope::Typing(payload(kind, raw.payload)?),
            EnvelopeKind::Join => Envelope::Join(payload(kind, raw.payload)?),
            EnvelopeKind::Leave => Envelope::Leave(payload(kind, raw.payload)?),
        };

        Ok(envelope)
    }
}

fn payload<T: DeserializeOwned>(
    kind: EnvelopeKind,
    value: Option<serde_json::Value>,
) -> Result<T, ProtocolError> {
    let value = value.ok_or(ProtocolError::MissingPayload(kind))?;
    serde_json::from_value(value).map_err(|source| ProtocolError::Payload { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one_of_each() -> Vec<Envelope> {
        vec![
            Envelope::Ping,
            Envelope::Pong,
            Envelope::Close,
            Envelope::error("room is full"),
            Envelope::chat("hi", "alice"),
            Envelope::typing("bob", true),
            Envelope::join("alice"),
            Envelope::leave("bob"),
        ]
    }

    #[test]
    fn every_kind_survives_encode_decode() {
        let envelopes = one_of_each();
        let kinds: Vec<_> = envelopes.iter().map(Envelope::kind).collect();
        assert_eq!(kinds, EnvelopeKind::ALL);

        for envelope in envelopes {
            let text = envelope.encode().unwrap();
            assert_eq!(Envelope::decode(&text).unwrap(), envelope, "frame: {}", text);
        }
    }

    #[test]
    fn chat_wire_format() {
        let text = Envelope::chat("hi", "alice").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "MESSAGE", "payload": {"text": "hi", "from": "alice"}})
        );
    }

    #[test]
    fn typing_uses_camel_case_flag() {
        let text = Envelope::typing("bob", false).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "TYPING", "payload": {"from": "bob", "isTyping": false}})
        );
    }

    #[test]
    fn typing_accepts_snake_case_flag() {
        let envelope =
            Envelope::decode(r#"{"type":"TYPING","payload":{"from":"bob","is_typing":true}}"#)
                .unwrap();
        assert_eq!(envelope, Envelope::typing("bob", true));
    }

    #[test]
    fn payloadless_kinds_omit_payload() {
        for envelope in [Envelope::Ping, Envelope::Pong, Envelope::Close] {
            let value: serde_json::Value =
                serde_json::from_str(&envelope.encode().unwrap()).unwrap();
            assert_eq!(value, json!({"type": envelope.kind().as_str()}));
        }
    }

    #[test]
    fn payloadless_kinds_accept_null_or_stray_payload() {
        assert_eq!(
            Envelope::decode(r#"{"type":"PING","payload":null}"#).unwrap(),
            Envelope::Ping
        );
        assert_eq!(
            Envelope::decode(r#"{"type":"PONG","payload":{"x":1}}"#).unwrap(),
            Envelope::Pong
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Envelope::decode(r#"{"type":"SHOUT","payload":{"from":"a"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref t) if t == "SHOUT"));
    }

    #[test]
    fn lowercase_type_is_unknown() {
        let err = Envelope::decode(r#"{"type":"message","payload":{"text":"a","from":"b"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(_)));
    }

    #[test]
    fn payload_shape_mismatch_is_rejected() {
        let err = Envelope::decode(r#"{"type":"MESSAGE","payload":{"from":"a"}}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Payload {
                kind: EnvelopeKind::Message,
                ..
            }
        ));

        let err =
            Envelope::decode(r#"{"type":"TYPING","payload":{"from":"a","isTyping":"yes"}}"#)
                .unwrap_err();
        assert!(matches!(err, ProtocolError::Payload { .. }));
    }

    #[test]
    fn missing_payload_is_rejected() {
        let err = Envelope::decode(r#"{"type":"JOIN"}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingPayload(EnvelopeKind::Join)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            Envelope::decode("not json").unwrap_err(),
            ProtocolError::InvalidJson(_)
        ));
        assert!(matches!(
            Envelope::decode(r#"{"payload":{}}"#).unwrap_err(),
            ProtocolError::InvalidJson(_)
        ));
    }
}
