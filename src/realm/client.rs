use std::sync::atomic::{AtomicI64, Ordering};

use axum::extract::ws::{CloseFrame, Message as WsMessage};

use crate::message::Message;
use crate::ws::ConnectionSender;

/// One connected identity.
///
/// The record owns its connection's write path: every frame to this peer —
/// acknowledgments, relayed messages, close frames — goes through the sender
/// channel feeding the connection's writer task, so the socket is never
/// written from two call sites concurrently.
pub struct Client {
    id: String,
    token: String,
    sender: ConnectionSender,
    /// Unix milliseconds of the last inbound frame (heartbeats included).
    last_seen: AtomicI64,
}

impl Client {
    pub fn new(id: &str, token: &str, sender: ConnectionSender) -> Self {
        Self {
            id: id.to_string(),
            token: token.to_string(),
            sender,
            last_seen: AtomicI64::new(now_millis()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Serialize a protocol message onto the connection's write path.
    /// Returns false when the writer task is gone (connection dead).
    pub fn send(&self, message: &Message) -> bool {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(client_id = %self.id, error = %e, "failed to serialize frame");
                return false;
            }
        };
        self.sender.send(WsMessage::Text(json.into())).is_ok()
    }

    /// Queue a close frame; the writer task delivers it and stops, and the
    /// reader loop tears the connection down through the normal close path.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.sender.send(WsMessage::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })));
    }

    /// Record inbound activity.
    pub fn touch(&self) {
        self.last_seen.store(now_millis(), Ordering::Relaxed);
    }

    pub fn last_seen_millis(&self) -> i64 {
        self.last_seen.load(Ordering::Relaxed)
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
