use thiserror::Error;

use crate::engine::connection_registry::ConnectionId;

/// Failures surfaced by the room and presence core.
///
/// Expected outcomes (already a member, not a member, owner staying in
/// their own room) are not errors and never appear here.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    /// The referenced room does not exist.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Registry misuse: the connection ID is already registered.
    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// Registry misuse: the connection ID is not registered.
    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// The real-time side is not serving presence (e.g. after shutdown).
    #[error("Presence is unavailable")]
    PresenceUnavailable,

    /// The persistence layer failed. Not retried here.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl RoomError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
