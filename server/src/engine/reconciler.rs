use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::presence_index::{ConnectedUser, PresenceSnapshot};
use super::room::Room;
use crate::error::RoomError;

/// Anything that can report live presence for a room.
pub trait PresenceSource: Send + Sync {
    fn room_presence(&self, room_id: &str) -> Result<PresenceSnapshot, RoomError>;
}

/// A durable room merged with its live presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRoom {
    #[serde(flatten)]
    pub room: Room,
    pub active_user_count: usize,
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    pub connected_users: Vec<ConnectedUser>,
}

impl EnrichedRoom {
    /// Combine a room with the outcome of a presence read. An unavailable
    /// presence read yields an idle room instead of an error.
    pub fn assemble(room: Room, presence: Result<PresenceSnapshot, RoomError>) -> Self {
        let snapshot = match presence {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(room_id = %room.id, error = %e, "presence unavailable, reporting room as idle");
                PresenceSnapshot::default()
            }
        };

        Self {
            last_activity: room.last_activity(),
            active_user_count: snapshot.count,
            is_active: snapshot.is_active(),
            connected_users: snapshot.preview,
            room,
        }
    }
}

/// Produces activity snapshots for rooms from a presence source.
#[derive(Clone)]
pub struct PresenceReconciler {
    source: Arc<dyn PresenceSource>,
}

impl PresenceReconciler {
    pub fn new(source: Arc<dyn PresenceSource>) -> Self {
        Self { source }
    }

    pub fn activity_snapshot(&self, room: Room) -> EnrichedRoom {
        let presence = self.source.room_presence(&room.id);
        EnrichedRoom::assemble(room, presence)
    }

    /// Snapshot each room independently, preserving input order.
    pub fn activity_snapshot_batch(&self, rooms: Vec<Room>) -> Vec<EnrichedRoom> {
        rooms
            .into_iter()
            .map(|room| self.activity_snapshot(room))
            .collect()
    }
}
