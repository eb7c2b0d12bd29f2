use axum::{
    extract::{
        ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::errors::AdmissionError;
use crate::state::AppState;
use crate::ws::{actor, CLOSE_OVERRIDDEN, CLOSE_REJECTED};

/// Query parameters for a signaling connection attempt. All three are
/// required, but absence is reported as a protocol error frame after the
/// upgrade rather than failing the HTTP handshake, so each field is
/// optional at extraction time.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub key: Option<String>,
    pub id: Option<String>,
    pub token: Option<String>,
}

/// GET <effective_path>?key=..&id=..&token=..
/// Signaling endpoint. Path mismatches never reach this handler (404 at the
/// router); parameter, key, capacity, and collision checks run here, in that
/// order, each rejection delivering its error frame before the close.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state, params))
}

async fn handle_connection(socket: WebSocket, state: AppState, params: WsQuery) {
    let (key, id, token) = match (params.key, params.id, params.token) {
        (Some(key), Some(id), Some(token)) => (key, id, token),
        _ => return reject(socket, AdmissionError::InvalidWsParameters).await,
    };

    if key != state.config.key {
        tracing::warn!(client_id = %id, "connection attempt with invalid key");
        return reject(socket, AdmissionError::InvalidKey).await;
    }

    // Split the socket and start the writer task before admission: the OPEN
    // acknowledgment, any buffered backlog, and capacity/collision rejection
    // frames all flow through the one serialized write path.
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    let writer = tokio::spawn(actor::writer_task(ws_sender, rx));

    match state.realm.admit(&id, &token, tx.clone()) {
        Ok(admission) => {
            if let Some(evicted) = admission.evicted {
                tracing::info!(client_id = %id, "new connection overrides existing one");
                evicted.close(CLOSE_OVERRIDDEN, "connection overridden");
            }
            actor::run_connection(ws_receiver, writer, state, admission.client, tx).await;
        }
        Err(kind) => {
            tracing::info!(client_id = %id, reason = %kind, "connection rejected");
            if let Ok(json) = serde_json::to_string(&kind.to_message()) {
                let _ = tx.send(WsMessage::Text(json.into()));
            }
            let _ = tx.send(WsMessage::Close(Some(CloseFrame {
                code: CLOSE_REJECTED,
                reason: kind.to_string().into(),
            })));
            drop(tx);
            // the writer drains the channel in order, so the error frame is
            // on the wire before the close
            let _ = writer.await;
        }
    }
}

/// Reject before the socket is split: parameter and key failures never
/// create a record or a writer task. Sends are sequenced, not raced.
async fn reject(mut socket: WebSocket, kind: AdmissionError) {
    if let Ok(json) = serde_json::to_string(&kind.to_message()) {
        let _ = socket.send(WsMessage::Text(json.into())).await;
    }
    let _ = socket
        .send(WsMessage::Close(Some(CloseFrame {
            code: CLOSE_REJECTED,
            reason: kind.to_string().into(),
        })))
        .await;
}
