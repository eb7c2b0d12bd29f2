//! Public discovery API.
//!
//! Small REST surface clients probe before opening the signaling socket:
//! server identification, fresh id generation, and (when enabled) the
//! connected-peer listing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

/// GET <base>/ — server identification.
pub async fn server_info() -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "A signaling relay for brokering peer-to-peer connections.",
    }))
}

/// GET <base>/{key}/id — generate an unclaimed client id as plain text.
/// The key is not validated here: ids are not secrets, and the socket
/// admission re-checks the key anyway.
pub async fn generate_id(Path(_key): Path<String>) -> String {
    Uuid::new_v4().to_string()
}

/// GET <base>/{key}/peers — list connected ids when discovery is enabled.
pub async fn list_peers(
    State(state): State<AppState>,
    Path(_key): Path<String>,
) -> impl IntoResponse {
    if !state.config.allow_discovery {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(state.realm.client_ids()).into_response()
}

/// Basic health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}
