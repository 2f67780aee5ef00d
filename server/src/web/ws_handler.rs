use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::connection_registry::{ConnectionId, DisplayMeta};
use crate::engine::validation;

use super::app_state::AppState;
use super::auth_middleware::AuthUser;

#[derive(Deserialize)]
pub struct WsParams {
    /// Display name shown to others in the room. Defaults to the user ID.
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Frames a client sends over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Announce presence in a room (leaves any previous room).
    JoinRoom { room_id: String },
    /// Stop announcing presence without disconnecting.
    LeaveRoom,
}

/// Frames the server sends back.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Bound {
        room_id: String,
        active_user_count: usize,
    },
    Unbound,
    Error {
        message: String,
    },
}

/// GET /ws — upgrade to a presence session.
pub async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let name = params
        .name
        .map(|n| n.trim().to_string())
        .unwrap_or_else(|| auth.user_id.clone());
    if let Err(e) = validation::validate_display_name(&name) {
        return (StatusCode::BAD_REQUEST, e).into_response();
    }

    let display = DisplayMeta {
        name,
        avatar_url: params.avatar_url,
    };
    let user_id = auth.user_id;
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, display))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    user_id: String,
    display: DisplayMeta,
) {
    // Dropping the guard deregisters, however this task ends.
    let guard = match state
        .registry
        .register_guarded(Uuid::new_v4(), user_id.clone(), display)
    {
        Ok(guard) => guard,
        Err(e) => {
            warn!(%user_id, error = %e, "refusing websocket session");
            return;
        }
    };
    let connection_id = guard.id();
    info!(%connection_id, %user_id, "websocket connected");

    let (mut sender, mut receiver) = socket.split();

    while let Some(Ok(msg)) = receiver.next().await {
        let reply = match msg {
            Message::Text(text) => handle_frame(&state, connection_id, text.as_str()).await,
            Message::Close(_) => break,
            _ => continue,
        };

        let Ok(json) = serde_json::to_string(&reply) else {
            continue;
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }

    drop(guard);
    info!(%connection_id, %user_id, "websocket disconnected");
}

/// Apply one client frame to the registry and build the reply.
pub async fn handle_frame(state: &AppState, connection_id: ConnectionId, text: &str) -> ServerFrame {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => {
            return ServerFrame::Error {
                message: "Invalid frame".into(),
            };
        }
    };

    match frame {
        ClientFrame::JoinRoom { room_id } => {
            match state.directory.room_exists(&room_id).await {
                Ok(true) => {}
                Ok(false) => {
                    return ServerFrame::Error {
                        message: "Room not found".into(),
                    };
                }
                Err(e) => {
                    error!(%room_id, error = %e, "failed to look up room for presence");
                    return ServerFrame::Error {
                        message: "Failed to join room".into(),
                    };
                }
            }

            if let Err(e) = state.registry.bind_to_room(connection_id, &room_id) {
                warn!(%connection_id, %room_id, error = %e, "failed to bind connection");
                return ServerFrame::Error {
                    message: "Failed to join room".into(),
                };
            }

            let active_user_count = state.registry.presence().snapshot(&room_id).count;
            ServerFrame::Bound {
                room_id,
                active_user_count,
            }
        }
        ClientFrame::LeaveRoom => {
            state.registry.unbind(connection_id);
            ServerFrame::Unbound
        }
    }
}
