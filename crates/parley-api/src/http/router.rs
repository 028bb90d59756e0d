//! Axum router configuration with middleware.
//!
//! Live room and membership endpoints live under `/ws/`, persisted history
//! and rooms under `/api/`. Middleware: CORS (any origin), request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ws_routes = Router::new()
        .route("/createRoom", post(handlers::room::create_live_room))
        .route("/joinRoom/{room_id}", get(handlers::ws::join_room))
        .route("/getRooms", get(handlers::room::list_live_rooms))
        .route("/getClients/{room_id}", get(handlers::room::list_live_members));

    let api_routes = Router::new()
        .route(
            "/messages/room/{room_id}",
            get(handlers::message::get_room_messages),
        )
        .route("/messages/{message_id}", get(handlers::message::get_message))
        .route(
            "/rooms",
            post(handlers::room::create_room).get(handlers::room::list_rooms),
        )
        .route("/rooms/{room_id}", get(handlers::room::get_room));

    Router::new()
        .nest("/ws", ws_routes)
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness check.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
