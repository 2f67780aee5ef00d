use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::room::{NewRoom, Room};
use crate::error::RoomError;

/// Predicates the directory needs from persistence. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub is_private: Option<bool>,
    pub created_by: Option<String>,
    /// Case-insensitive literal substring of name OR description.
    pub text: Option<String>,
}

impl RoomFilter {
    pub fn public() -> Self {
        Self {
            is_private: Some(false),
            ..Self::default()
        }
    }

    pub fn owned_by(user_id: &str) -> Self {
        Self {
            created_by: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    pub fn containing(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn matches(&self, room: &Room) -> bool {
        if let Some(is_private) = self.is_private
            && room.is_private != is_private
        {
            return false;
        }
        if let Some(owner) = &self.created_by
            && &room.created_by != owner
        {
            return false;
        }
        self.matches_text(&room.name, &room.description)
    }

    /// Text predicate alone, folding case with full Unicode lowercasing.
    pub fn matches_text(&self, name: &str, description: &str) -> bool {
        let Some(text) = &self.text else {
            return true;
        };
        let needle = text.to_lowercase();
        name.to_lowercase().contains(&needle) || description.to_lowercase().contains(&needle)
    }
}

/// Durable storage for rooms and their member sets.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Rooms matching the filter, oldest first.
    async fn find(&self, filter: &RoomFilter) -> Result<Vec<Room>, RoomError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Room>, RoomError>;

    /// Insert a room with a fresh ID; the owner becomes its only member.
    async fn create(&self, room: NewRoom) -> Result<Room, RoomError>;

    /// Persist the full state of an existing room, member set included.
    async fn save(&self, room: &Room) -> Result<(), RoomError>;
}

/// Process-local store, used when running without a database and in tests.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<Vec<Room>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn find(&self, filter: &RoomFilter) -> Result<Vec<Room>, RoomError> {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        Ok(rooms.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Room>, RoomError> {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        Ok(rooms.iter().find(|r| r.id == id).cloned())
    }

    async fn create(&self, new: NewRoom) -> Result<Room, RoomError> {
        let now = Utc::now();
        let room = Room {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            language: new.language,
            is_private: new.is_private,
            members: [new.created_by.clone()].into(),
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        self.rooms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(room.clone());
        Ok(room)
    }

    async fn save(&self, room: &Room) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        let slot = rooms
            .iter_mut()
            .find(|r| r.id == room.id)
            .ok_or_else(|| RoomError::RoomNotFound(room.id.clone()))?;
        *slot = room.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_room(name: &str, description: &str, owner: &str, is_private: bool) -> NewRoom {
        NewRoom {
            name: name.into(),
            description: description.into(),
            language: "Rust".into(),
            is_private,
            created_by: owner.into(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_owner_membership() {
        let store = MemoryRoomStore::new();
        let room = store
            .create(new_room("alpha", "", "alice", false))
            .await
            .unwrap();
        assert!(!room.id.is_empty());
        assert!(room.is_member("alice"));
        assert_eq!(room.member_count(), 1);
        assert_eq!(room.created_at, room.updated_at);

        let fetched = store.find_by_id(&room.id).await.unwrap().unwrap();
        assert_eq!(fetched, room);
    }

    #[tokio::test]
    async fn test_find_applies_filters() {
        let store = MemoryRoomStore::new();
        store
            .create(new_room("Rust Pairing", "borrowck", "alice", false))
            .await
            .unwrap();
        store
            .create(new_room("secret", "rust internals", "alice", true))
            .await
            .unwrap();
        store
            .create(new_room("Go", "goroutines", "bob", false))
            .await
            .unwrap();

        assert_eq!(store.find(&RoomFilter::public()).await.unwrap().len(), 2);
        assert_eq!(store.find(&RoomFilter::owned_by("alice")).await.unwrap().len(), 2);

        let hits = store
            .find(&RoomFilter::public().containing("RUST"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Rust Pairing");

        // Matches on description too.
        let hits = store
            .find(&RoomFilter::public().containing("gorout"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_text_filter_is_literal() {
        let store = MemoryRoomStore::new();
        store
            .create(new_room("alpha", "plain", "alice", false))
            .await
            .unwrap();
        let hits = store
            .find(&RoomFilter::public().containing(".*"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_state() {
        let store = MemoryRoomStore::new();
        let mut room = store
            .create(new_room("alpha", "", "alice", false))
            .await
            .unwrap();
        room.members.insert("bob".into());
        store.save(&room).await.unwrap();

        let fetched = store.find_by_id(&room.id).await.unwrap().unwrap();
        assert!(fetched.is_member("bob"));
    }

    #[tokio::test]
    async fn test_save_unknown_room_fails() {
        let store = MemoryRoomStore::new();
        let mut room = store
            .create(new_room("alpha", "", "alice", false))
            .await
            .unwrap();
        room.id = "missing".into();
        assert!(matches!(
            store.save(&room).await,
            Err(RoomError::RoomNotFound(_))
        ));
    }
}
