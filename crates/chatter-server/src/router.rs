//! Axum router construction.
//!
//! Assembles the `WebSocket` route and the health check into a single
//! [`Router`] with CORS and request tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::session;
use crate::state::AppState;

/// Build the complete router.
///
/// - `GET /connect` -- `WebSocket` session (optional `?world=<id>`)
/// - `GET /health` -- liveness check, always `ok`
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/connect", get(session::connect))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
