//! HTTP route handlers.
//!
//! All handlers are thin; the only non-trivial one (`/ws`) delegates
//! immediately to [`ws::ws_handler`].

use axum::{routing::get, Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::ws::ws_handler;
use crate::api::AppState;

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness probe: "Is the process running?"
///
/// Always returns 200 OK if the server is responding.
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe: "Can the service handle requests?"
///
/// The hub has no external dependencies to warm up, so readiness tracks
/// liveness exactly; kept as a separate route for infrastructure that
/// probes them independently.
async fn readiness_check(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ready",
        "rooms": state.hub.room_count(),
    }))
}
