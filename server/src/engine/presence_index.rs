use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use super::connection_registry::{Connection, ConnectionId, DisplayMeta};

/// How many connected users a snapshot carries for cheap summaries.
pub const PRESENCE_PREVIEW_LIMIT: usize = 6;

/// One live connection bound to a room.
#[derive(Debug, Clone)]
pub(crate) struct Occupant {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub display: DisplayMeta,
    pub connected_at: DateTime<Utc>,
}

impl Occupant {
    pub(crate) fn from_connection(conn: &Connection) -> Self {
        Self {
            connection_id: conn.id,
            user_id: conn.user_id.clone(),
            display: conn.display.clone(),
            connected_at: conn.connected_at,
        }
    }
}

/// A user currently connected to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedUser {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub online: bool,
}

/// Point-in-time presence for one room. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSnapshot {
    /// Distinct users with at least one live connection in the room.
    pub count: usize,
    /// Up to [`PRESENCE_PREVIEW_LIMIT`] users, one entry per user, in first-bound order.
    pub preview: Vec<ConnectedUser>,
    pub user_ids: HashSet<String>,
}

impl PresenceSnapshot {
    pub fn is_active(&self) -> bool {
        self.count > 0
    }
}

/// Room -> live connections, fed synchronously by the connection registry.
///
/// Each room keeps its occupants in bind order. Every read takes a single
/// room guard, so a snapshot is computed from one consistent view of that
/// room and is never cached past the call.
#[derive(Default)]
pub struct PresenceIndex {
    rooms: DashMap<String, Vec<Occupant>>,
}

impl PresenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, room_id: &str, occupant: Occupant) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .push(occupant);
    }

    pub(crate) fn detach(&self, room_id: &str, connection_id: ConnectionId) {
        // The guard must be released before remove_if locks the same shard.
        {
            let Some(mut occupants) = self.rooms.get_mut(room_id) else {
                return;
            };
            occupants.retain(|o| o.connection_id != connection_id);
        }

        // Drop empty rooms so the index only holds live rooms.
        self.rooms.remove_if(room_id, |_, occupants| occupants.is_empty());
    }

    pub(crate) fn clear(&self) {
        self.rooms.clear();
    }

    /// Derive presence for a room from its current occupants.
    pub fn snapshot(&self, room_id: &str) -> PresenceSnapshot {
        let Some(occupants) = self.rooms.get(room_id) else {
            return PresenceSnapshot::default();
        };

        let mut user_ids = HashSet::new();
        let mut preview = Vec::new();
        for occupant in occupants.iter() {
            if !user_ids.insert(occupant.user_id.clone()) {
                continue;
            }
            if preview.len() < PRESENCE_PREVIEW_LIMIT {
                preview.push(ConnectedUser {
                    id: occupant.user_id.clone(),
                    name: occupant.display.name.clone(),
                    avatar_url: occupant.display.avatar_url.clone(),
                    online: true,
                });
            }
        }

        PresenceSnapshot {
            count: user_ids.len(),
            preview,
            user_ids,
        }
    }

    pub fn is_active(&self, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|occupants| !occupants.is_empty())
    }

    /// Live connections bound to a room, in bind order.
    pub fn connections(&self, room_id: &str) -> Vec<Connection> {
        let Some(occupants) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        occupants
            .iter()
            .map(|o| Connection {
                id: o.connection_id,
                user_id: o.user_id.clone(),
                display: o.display.clone(),
                room_id: Some(room_id.to_string()),
                connected_at: o.connected_at,
            })
            .collect()
    }

    /// Number of rooms with at least one live connection.
    pub fn active_room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn occupant(user_id: &str) -> Occupant {
        Occupant {
            connection_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            display: DisplayMeta {
                name: format!("{user_id}-name"),
                avatar_url: None,
            },
            connected_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_room_snapshot() {
        let index = PresenceIndex::new();
        let snap = index.snapshot("nowhere");
        assert_eq!(snap.count, 0);
        assert!(snap.preview.is_empty());
        assert!(!snap.is_active());
        assert!(!index.is_active("nowhere"));
    }

    #[test]
    fn test_counts_distinct_users_not_connections() {
        let index = PresenceIndex::new();
        index.attach("alpha", occupant("bob"));
        index.attach("alpha", occupant("bob"));
        index.attach("alpha", occupant("carol"));

        let snap = index.snapshot("alpha");
        assert_eq!(snap.count, 2);
        assert_eq!(snap.preview.len(), 2);
        assert_eq!(snap.preview[0].id, "bob");
        assert_eq!(snap.preview[1].id, "carol");
        assert!(snap.preview.iter().all(|u| u.online));
        assert_eq!(index.connections("alpha").len(), 3);
    }

    #[test]
    fn test_preview_is_bounded_and_first_seen_wins() {
        let index = PresenceIndex::new();
        for i in 0..10 {
            index.attach("alpha", occupant(&format!("user{i}")));
        }

        let first = index.snapshot("alpha");
        assert_eq!(first.count, 10);
        assert_eq!(first.preview.len(), PRESENCE_PREVIEW_LIMIT);
        let ids: Vec<&str> = first.preview.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["user0", "user1", "user2", "user3", "user4", "user5"]);

        // Repeated reads without changes are identical.
        assert_eq!(index.snapshot("alpha"), first);
    }

    #[test]
    fn test_detach_removes_only_that_connection() {
        let index = PresenceIndex::new();
        let a = occupant("bob");
        let b = occupant("bob");
        let a_id = a.connection_id;
        index.attach("alpha", a);
        index.attach("alpha", b);

        index.detach("alpha", a_id);
        let snap = index.snapshot("alpha");
        assert_eq!(snap.count, 1);
        assert!(snap.user_ids.contains("bob"));
    }

    #[test]
    fn test_detach_last_connection_drops_room() {
        let index = PresenceIndex::new();
        let o = occupant("bob");
        let id = o.connection_id;
        index.attach("alpha", o);
        assert_eq!(index.active_room_count(), 1);

        index.detach("alpha", id);
        assert_eq!(index.active_room_count(), 0);
        assert!(!index.is_active("alpha"));

        // Detaching again is harmless.
        index.detach("alpha", id);
    }

    #[test]
    fn test_connections_carry_room_binding() {
        let index = PresenceIndex::new();
        index.attach("alpha", occupant("bob"));
        let conns = index.connections("alpha");
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].room_id.as_deref(), Some("alpha"));
        assert_eq!(conns[0].display.name, "bob-name");
    }
}
