use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::presence_index::{Occupant, PresenceIndex, PresenceSnapshot};
use super::reconciler::PresenceSource;
use crate::error::RoomError;

/// Unique identifier for one live real-time connection (not per user).
pub type ConnectionId = Uuid;

/// Display fields captured when the connection registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A live connection and the room it has announced presence in, if any.
#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: String,
    pub display: DisplayMeta,
    pub room_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Owns every live connection and keeps the presence index in step with
/// room bindings.
///
/// Created once at startup and shared by reference. Mutations lock the
/// connection's entry first and the room's entry second, never the other
/// way round, so a connection is never visible in two rooms and readers
/// of a room never see a half-applied change.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    presence: PresenceIndex,
    closed: AtomicBool,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            presence: PresenceIndex::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a new connection. It starts unbound.
    pub fn register(
        &self,
        id: ConnectionId,
        user_id: String,
        display: DisplayMeta,
    ) -> Result<(), RoomError> {
        if self.is_closed() {
            return Err(RoomError::PresenceUnavailable);
        }

        match self.connections.entry(id) {
            Entry::Occupied(_) => return Err(RoomError::DuplicateConnection(id)),
            Entry::Vacant(slot) => {
                slot.insert(Connection {
                    id,
                    user_id: user_id.clone(),
                    display,
                    room_id: None,
                    connected_at: Utc::now(),
                });
            }
        }

        // A shutdown that cleared the map after the check above must not
        // leave this entry behind.
        if self.is_closed() {
            self.connections.remove(&id);
            return Err(RoomError::PresenceUnavailable);
        }

        debug!(connection_id = %id, %user_id, "connection registered");
        Ok(())
    }

    /// Register a connection and return a guard that deregisters it on drop.
    pub fn register_guarded(
        self: &Arc<Self>,
        id: ConnectionId,
        user_id: String,
        display: DisplayMeta,
    ) -> Result<ConnectionGuard, RoomError> {
        self.register(id, user_id, display)?;
        Ok(ConnectionGuard {
            registry: Arc::clone(self),
            id,
        })
    }

    /// Bind a connection to a room, leaving its previous room first.
    pub fn bind_to_room(&self, id: ConnectionId, room_id: &str) -> Result<(), RoomError> {
        let mut conn = self
            .connections
            .get_mut(&id)
            .ok_or(RoomError::UnknownConnection(id))?;

        if conn.room_id.as_deref() == Some(room_id) {
            return Ok(());
        }

        if let Some(previous) = conn.room_id.take() {
            self.presence.detach(&previous, id);
        }
        self.presence.attach(room_id, Occupant::from_connection(&conn));
        conn.room_id = Some(room_id.to_string());

        debug!(connection_id = %id, %room_id, "connection bound to room");
        Ok(())
    }

    /// Clear a connection's room binding. Returns false if there was nothing to clear.
    pub fn unbind(&self, id: ConnectionId) -> bool {
        let Some(mut conn) = self.connections.get_mut(&id) else {
            return false;
        };
        let Some(room_id) = conn.room_id.take() else {
            return false;
        };
        self.presence.detach(&room_id, id);

        debug!(connection_id = %id, %room_id, "connection unbound");
        true
    }

    /// Remove a connection entirely. Safe to call any number of times;
    /// returns true only for the call that actually removed it.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        // Detaching inside remove_if keeps the entry locked until the room
        // no longer lists it, so a racing bind cannot re-attach it.
        let removed = self.connections.remove_if(&id, |_, conn| {
            if let Some(room_id) = &conn.room_id {
                self.presence.detach(room_id, id);
            }
            true
        });

        match removed {
            Some((_, conn)) => {
                debug!(connection_id = %id, user_id = %conn.user_id, "connection deregistered");
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the connections bound to a room.
    pub fn connections_in_room(&self, room_id: &str) -> Vec<Connection> {
        self.presence.connections(room_id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|c| c.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn presence(&self) -> &PresenceIndex {
        &self.presence
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Tear down at process shutdown. Afterwards presence reads report
    /// unavailable and new registrations are refused.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = self.connections.len();
        self.connections.clear();
        self.presence.clear();
        info!(dropped, "connection registry shut down");
    }
}

impl PresenceSource for ConnectionRegistry {
    fn room_presence(&self, room_id: &str) -> Result<PresenceSnapshot, RoomError> {
        if self.is_closed() {
            return Err(RoomError::PresenceUnavailable);
        }
        Ok(self.presence.snapshot(room_id))
    }
}

/// Deregisters its connection when dropped, whether the socket closed
/// cleanly, errored, or the task was cancelled.
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> DisplayMeta {
        DisplayMeta {
            name: name.to_string(),
            avatar_url: Some(format!("https://avatars.test/{name}.png")),
        }
    }

    fn connect(registry: &ConnectionRegistry, user_id: &str) -> ConnectionId {
        let id = Uuid::new_v4();
        registry.register(id, user_id.to_string(), meta(user_id)).unwrap();
        id
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let registry = ConnectionRegistry::new();
        let id = connect(&registry, "alice");
        let err = registry
            .register(id, "alice".into(), meta("alice"))
            .unwrap_err();
        assert!(matches!(err, RoomError::DuplicateConnection(dup) if dup == id));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_bind_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        let err = registry.bind_to_room(id, "alpha").unwrap_err();
        assert!(matches!(err, RoomError::UnknownConnection(unknown) if unknown == id));
    }

    #[test]
    fn test_bind_moves_connection_between_rooms() {
        let registry = ConnectionRegistry::new();
        let id = connect(&registry, "alice");

        registry.bind_to_room(id, "alpha").unwrap();
        assert_eq!(registry.connections_in_room("alpha").len(), 1);

        registry.bind_to_room(id, "beta").unwrap();
        assert!(registry.connections_in_room("alpha").is_empty());
        assert_eq!(registry.connections_in_room("beta").len(), 1);
        assert_eq!(registry.get(id).unwrap().room_id.as_deref(), Some("beta"));
    }

    #[test]
    fn test_rebinding_same_room_does_not_duplicate() {
        let registry = ConnectionRegistry::new();
        let id = connect(&registry, "alice");
        registry.bind_to_room(id, "alpha").unwrap();
        registry.bind_to_room(id, "alpha").unwrap();
        assert_eq!(registry.connections_in_room("alpha").len(), 1);
    }

    #[test]
    fn test_unbind_is_noop_when_unbound() {
        let registry = ConnectionRegistry::new();
        let id = connect(&registry, "alice");
        assert!(!registry.unbind(id));

        registry.bind_to_room(id, "alpha").unwrap();
        assert!(registry.unbind(id));
        assert!(!registry.unbind(id));
        assert!(!registry.presence().is_active("alpha"));
        // Still registered, just not in a room.
        assert!(registry.get(id).is_some());
    }

    #[test]
    fn test_deregister_is_idempotent_and_unbinds() {
        let registry = ConnectionRegistry::new();
        let id = connect(&registry, "alice");
        registry.bind_to_room(id, "alpha").unwrap();

        assert!(registry.deregister(id));
        assert!(!registry.deregister(id));
        assert!(registry.connections_in_room("alpha").is_empty());
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_guard_deregisters_on_drop() {
        let registry = Arc::new(ConnectionRegistry::new());
        let guard = registry
            .register_guarded(Uuid::new_v4(), "alice".into(), meta("alice"))
            .unwrap();
        registry.bind_to_room(guard.id(), "alpha").unwrap();
        assert!(registry.presence().is_active("alpha"));

        let id = guard.id();
        // An explicit deregister before the drop must not trip the guard.
        registry.deregister(id);
        drop(guard);
        assert!(registry.get(id).is_none());
        assert!(!registry.presence().is_active("alpha"));
    }

    #[test]
    fn test_shutdown_refuses_registration_and_presence() {
        let registry = ConnectionRegistry::new();
        let id = connect(&registry, "alice");
        registry.bind_to_room(id, "alpha").unwrap();

        registry.shutdown();
        assert_eq!(registry.connection_count(), 0);
        assert!(matches!(
            registry.room_presence("alpha"),
            Err(RoomError::PresenceUnavailable)
        ));
        assert!(matches!(
            registry.register(Uuid::new_v4(), "bob".into(), meta("bob")),
            Err(RoomError::PresenceUnavailable)
        ));
        // Deregistering after shutdown is still fine.
        assert!(!registry.deregister(id));
    }

    #[test]
    fn test_concurrent_churn_leaves_consistent_index() {
        let registry = Arc::new(ConnectionRegistry::new());

        std::thread::scope(|scope| {
            for t in 0..8 {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for i in 0..200 {
                        let id = Uuid::new_v4();
                        let user = format!("user{}", (t + i) % 5);
                        registry.register(id, user.clone(), meta(&user)).unwrap();
                        registry.bind_to_room(id, "alpha").unwrap();
                        if i % 2 == 0 {
                            registry.bind_to_room(id, "beta").unwrap();
                        }
                        let snap = registry.presence().snapshot("alpha");
                        assert!(snap.count <= 5);
                        registry.deregister(id);
                        registry.deregister(id);
                    }
                });
            }
        });

        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.presence().active_room_count(), 0);
    }

    #[test]
    fn test_registration_racing_shutdown_leaves_nothing_behind() {
        for _ in 0..20 {
            let registry = Arc::new(ConnectionRegistry::new());

            std::thread::scope(|scope| {
                for t in 0..4 {
                    let registry = Arc::clone(&registry);
                    scope.spawn(move || {
                        for i in 0..100 {
                            let id = Uuid::new_v4();
                            let user = format!("user{t}-{i}");
                            if registry.register(id, user.clone(), meta(&user)).is_ok() {
                                let _ = registry.bind_to_room(id, "alpha");
                            }
                        }
                    });
                }
                let registry = Arc::clone(&registry);
                scope.spawn(move || registry.shutdown());
            });

            assert!(registry.is_closed());
            assert_eq!(registry.connection_count(), 0);
            assert_eq!(registry.presence().active_room_count(), 0);
        }
    }

    #[test]
    fn test_presence_source_counts_users_in_room() {
        let registry = ConnectionRegistry::new();
        let a = connect(&registry, "alice");
        let b1 = connect(&registry, "bob");
        let b2 = connect(&registry, "bob");
        for id in [a, b1, b2] {
            registry.bind_to_room(id, "alpha").unwrap();
        }

        let snap = registry.room_presence("alpha").unwrap();
        assert_eq!(snap.count, 2);
        assert!(snap.user_ids.contains("alice"));
        assert!(snap.user_ids.contains("bob"));
    }
}
