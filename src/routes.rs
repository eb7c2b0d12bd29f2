use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router: the signaling endpoint mounted at the
/// effective path (so any other path 404s at the transport layer) plus the
/// public discovery API under the configured base.
pub fn build_router(state: AppState) -> Router {
    let ws_route = state.config.ws_route();
    let base = state.config.api_base();
    let info_route = if base.is_empty() {
        "/".to_string()
    } else {
        base.clone()
    };

    // Discovery endpoints are browser-facing; CORS stays permissive.
    let api_routes = Router::new()
        .route(&info_route, get(api::server_info))
        .route(&format!("{base}/{{key}}/id"), get(api::generate_id))
        .route(&format!("{base}/{{key}}/peers"), get(api::list_peers))
        .layer(CorsLayer::permissive());

    let ws_routes = Router::new().route(&ws_route, get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", get(api::health_check));

    Router::new()
        .merge(api_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}
