use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::connection_registry::Connection;
use crate::engine::reconciler::EnrichedRoom;
use crate::engine::room::{CreateRoom, LeaveOutcome, Room};
use crate::error::RoomError;

use super::app_state::AppState;
use super::auth_middleware::AuthUser;

#[derive(Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RoomError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RoomError::RoomNotFound(_) => (StatusCode::NOT_FOUND, "Room not found".to_string()),
            RoomError::PresenceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Presence is unavailable".to_string(),
            ),
            RoomError::Persistence(_)
            | RoomError::DuplicateConnection(_)
            | RoomError::UnknownConnection(_) => {
                error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(MessageBody { message })).into_response()
    }
}

// ── Rooms ──────────────────────────────────────────────────

/// POST /api/rooms — create a room owned by the caller.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateRoom>,
) -> Result<(StatusCode, Json<Room>), RoomError> {
    let room = state.directory.create_room(body, &auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/rooms — all public rooms with live activity.
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<Json<Vec<EnrichedRoom>>, RoomError> {
    Ok(Json(state.directory.list_public_rooms().await?))
}

/// GET /api/rooms/mine — rooms the caller created.
pub async fn list_my_rooms(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Room>>, RoomError> {
    Ok(Json(state.directory.list_my_rooms(&auth.user_id).await?))
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// GET /api/rooms/search?query= — public rooms by name or description.
pub async fn search_rooms(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Room>>, RoomError> {
    let query = params.query.unwrap_or_default();
    Ok(Json(state.directory.search_rooms(&query).await?))
}

/// GET /api/rooms/{id} — one room with live activity.
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<EnrichedRoom>, RoomError> {
    Ok(Json(state.directory.get_room(&room_id).await?))
}

#[derive(Serialize)]
pub struct JoinResponse {
    pub message: &'static str,
    pub room: Room,
}

/// POST /api/rooms/{id}/join — become a member.
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<JoinResponse>, RoomError> {
    let room = state.directory.join_room(&room_id, &auth.user_id).await?;
    Ok(Json(JoinResponse {
        message: "Joined room",
        room,
    }))
}

#[derive(Serialize)]
pub struct LeaveResponse {
    pub message: &'static str,
    pub outcome: LeaveOutcome,
}

/// POST /api/rooms/{id}/leave — give up membership.
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<LeaveResponse>, RoomError> {
    let outcome = state.directory.leave_room(&room_id, &auth.user_id).await?;
    Ok(Json(LeaveResponse {
        message: outcome.message(),
        outcome,
    }))
}

#[derive(Serialize)]
pub struct PresenceResponse {
    pub room_id: String,
    pub active_user_count: usize,
    pub connections: Vec<Connection>,
}

/// GET /api/rooms/{id}/presence — every live connection in a room.
pub async fn room_presence(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<PresenceResponse>, RoomError> {
    let room = state.directory.get_room(&room_id).await?;
    Ok(Json(PresenceResponse {
        connections: state.registry.connections_in_room(&room_id),
        active_user_count: room.active_user_count,
        room_id,
    }))
}
