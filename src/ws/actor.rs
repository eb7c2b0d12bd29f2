use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::realm::client::Client;
use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::ConnectionSender;

/// Writer task: owns the socket sink and forwards frames from the
/// connection's channel in order. Stops once a close frame has been
/// delivered — nothing may follow it — or when the sink fails.
pub async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::UnboundedReceiver<WsMessage>,
) {
    while let Some(frame) = rx.recv().await {
        let closing = matches!(frame, WsMessage::Close(_));
        if ws_sender.send(frame).await.is_err() {
            break;
        }
        if closing {
            break;
        }
    }
}

/// Reader loop for an admitted connection: dispatch inbound frames into the
/// router until the peer disconnects, errs, or sends LEAVE, then release the
/// registry entry.
pub async fn run_connection(
    mut ws_receiver: SplitStream<WebSocket>,
    writer: JoinHandle<()>,
    state: AppState,
    client: Arc<Client>,
    tx: ConnectionSender,
) {
    tracing::info!(client_id = %client.id(), "client connected");

    loop {
        match ws_receiver.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if protocol::handle_frame(&state, &client, text.as_str()).is_break() {
                    break;
                }
            }
            Some(Ok(WsMessage::Binary(_))) => {
                // the protocol is JSON text; binary frames still count as liveness
                client.touch();
                tracing::debug!(client_id = %client.id(), "ignoring binary frame");
            }
            Some(Ok(WsMessage::Ping(data))) => {
                client.touch();
                let _ = tx.send(WsMessage::Pong(data));
            }
            Some(Ok(WsMessage::Pong(_))) => {
                client.touch();
            }
            Some(Ok(WsMessage::Close(frame))) => {
                tracing::info!(client_id = %client.id(), reason = ?frame, "client closed connection");
                break;
            }
            Some(Err(e)) => {
                tracing::warn!(client_id = %client.id(), error = %e, "socket receive error");
                break;
            }
            None => {
                break;
            }
        }
    }

    // Synchronous removal on close. Under override the id may already map to
    // the replacing record, which must survive this cleanup.
    state.realm.remove_if_same(client.id(), &client);
    writer.abort();

    tracing::info!(client_id = %client.id(), "client disconnected");
}
