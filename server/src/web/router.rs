use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use super::app_state::AppState;
use super::{rest_api, ws_handler};

/// Build the axum router with all HTTP and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Restrict CORS to the configured public_url origin (or allow any for local dev)
    let cors = if state.auth_config.is_local() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origin = state
            .auth_config
            .public_url
            .parse::<HeaderValue>()
            .unwrap_or_else(|_| HeaderValue::from_static("https://localhost"));
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let room_routes = Router::new()
        .route(
            "/api/rooms",
            get(rest_api::list_rooms).post(rest_api::create_room),
        )
        .route("/api/rooms/mine", get(rest_api::list_my_rooms))
        .route("/api/rooms/search", get(rest_api::search_rooms))
        .route("/api/rooms/{id}", get(rest_api::get_room))
        .route("/api/rooms/{id}/join", post(rest_api::join_room))
        .route("/api/rooms/{id}/leave", post(rest_api::leave_room))
        .route("/api/rooms/{id}/presence", get(rest_api::room_presence));

    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .merge(room_routes)
        .layer(cors)
        .with_state(state)
}
