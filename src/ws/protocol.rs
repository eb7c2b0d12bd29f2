//! Message router: one validated inbound frame to its destination's live
//! socket or offline buffer.

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::message::{Message, MessageType};
use crate::realm::client::Client;
use crate::realm::Delivery;
use crate::state::AppState;

/// Handle one inbound text frame from an admitted client. Returns `Break`
/// when the connection should be torn down (LEAVE).
///
/// The sender's identity was bound at admission; `src` on the wire is
/// overwritten with it before relay and never trusted for routing.
pub fn handle_frame(state: &AppState, client: &Arc<Client>, raw: &str) -> ControlFlow<()> {
    client.touch();

    let mut message: Message = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(client_id = %client.id(), error = %e, "dropping malformed frame");
            return ControlFlow::Continue(());
        }
    };

    match message.kind {
        // touch above is the whole heartbeat contract; no relay, no response
        MessageType::Heartbeat => ControlFlow::Continue(()),

        // server-originated types carry no meaning inbound
        MessageType::Open | MessageType::Error | MessageType::IdTaken => {
            tracing::debug!(client_id = %client.id(), kind = ?message.kind, "dropping server-only message type");
            ControlFlow::Continue(())
        }

        // graceful disconnect with no peer to notify
        MessageType::Leave if message.dst.is_none() => ControlFlow::Break(()),

        kind => {
            let Some(dst) = message.dst.clone() else {
                tracing::warn!(client_id = %client.id(), kind = ?kind, "dropping relay message without dst");
                return ControlFlow::Continue(());
            };
            message.src = Some(client.id().to_string());

            match state.realm.deliver_or_queue(&dst, message) {
                Delivery::Sent => {}
                Delivery::Queued => {
                    tracing::debug!(src = %client.id(), dst = %dst, kind = ?kind, "destination offline, message buffered");
                }
                Delivery::Dropped => {
                    tracing::debug!(src = %client.id(), dst = %dst, kind = ?kind, "destination offline, message dropped");
                }
            }

            // a relayed LEAVE still tears the sender down like a close
            if kind == MessageType::Leave {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }
}
