//! Axum router construction for the rendering API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS open so the widget can be embedded from any origin.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- HTML timeline
/// - `GET /ws/timeline` -- `WebSocket` timeline stream
/// - `GET /api/timeline` -- buffered events with styles
/// - `GET /api/timeline/groups` -- events grouped by day
/// - `GET /api/status` -- feed status
/// - `PUT /api/subscription` -- subscribe
/// - `DELETE /api/subscription` -- unsubscribe
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws/timeline", get(ws::ws_timeline))
        .route("/api/timeline", get(handlers::get_timeline))
        .route("/api/timeline/groups", get(handlers::get_groups))
        .route("/api/status", get(handlers::get_status))
        .route(
            "/api/subscription",
            put(handlers::put_subscription).delete(handlers::delete_subscription),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
