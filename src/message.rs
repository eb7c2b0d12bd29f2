//! Wire protocol envelope.
//!
//! Every frame in either direction is one JSON object with a `type` tag and
//! optional `src`/`dst`/`payload` fields. Relay payloads are opaque: the
//! server stamps `src`, routes on `dst`, and never looks inside.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Message type tags recognized by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum MessageType {
    /// Server → client: admission acknowledged.
    Open,
    /// Server → client: admission rejected; `payload.msg` names the kind.
    Error,
    /// Server → client: the requested identity is already registered.
    IdTaken,
    /// Keep-alive; updates the sender's last-seen time and nothing else.
    Heartbeat,
    /// Graceful disconnect; relayed to `dst` when one is named.
    Leave,
    /// Server → client: a message buffered for `src` was dropped unread.
    Expire,
    Offer,
    Answer,
    Candidate,
}

impl MessageType {
    /// Whether an undeliverable message of this type is held in the
    /// destination's offline buffer instead of being dropped.
    pub fn buffered_when_offline(self) -> bool {
        !matches!(self, MessageType::Leave | MessageType::Expire)
    }
}

/// One wire message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    /// Admission acknowledgment; carries no payload.
    pub fn open() -> Self {
        Self {
            kind: MessageType::Open,
            src: None,
            dst: None,
            payload: None,
        }
    }

    /// Rejection frame with the failure kind in `payload.msg`.
    pub fn error(msg: &str) -> Self {
        Self {
            kind: MessageType::Error,
            src: None,
            dst: None,
            payload: Some(json!({ "msg": msg })),
        }
    }

    /// Identity-collision rejection frame.
    pub fn id_taken() -> Self {
        Self {
            kind: MessageType::IdTaken,
            src: None,
            dst: None,
            payload: Some(json!({ "msg": "ID is taken" })),
        }
    }

    /// Expiry notice to `recipient` that its buffered message addressed to
    /// `unreachable` was dropped unread.
    pub fn expire(unreachable: &str, recipient: &str) -> Self {
        Self {
            kind: MessageType::Expire,
            src: Some(unreachable.to_string()),
            dst: Some(recipient.to_string()),
            payload: None,
        }
    }
}
