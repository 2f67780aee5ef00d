use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::RoomRow;
use crate::db::queries::rooms;
use crate::engine::room::{NewRoom, Room};
use crate::engine::room_store::{RoomFilter, RoomStore};
use crate::error::RoomError;

/// SQLite-backed room store.
#[derive(Clone)]
pub struct SqliteRoomStore {
    pool: SqlitePool,
}

impl SqliteRoomStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Attach member sets to room rows, preserving row order.
    async fn with_members(&self, rows: Vec<RoomRow>) -> Result<Vec<Room>, RoomError> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut members: HashMap<String, HashSet<String>> = HashMap::new();
        for m in rooms::get_members_for_rooms(&self.pool, &ids).await? {
            members.entry(m.room_id).or_default().insert(m.user_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let room_members = members.remove(&row.id).unwrap_or_default();
                room_from_row(row, room_members)
            })
            .collect())
    }
}

fn room_from_row(row: RoomRow, members: HashSet<String>) -> Room {
    Room {
        id: row.id,
        name: row.name,
        description: row.description,
        language: row.language,
        is_private: row.is_private,
        created_by: row.created_by,
        members,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn row_from_room(room: &Room) -> RoomRow {
    RoomRow {
        id: room.id.clone(),
        name: room.name.clone(),
        description: room.description.clone(),
        language: room.language.clone(),
        is_private: room.is_private,
        created_by: room.created_by.clone(),
        created_at: room.created_at,
        updated_at: room.updated_at,
    }
}

#[async_trait]
impl RoomStore for SqliteRoomStore {
    async fn find(&self, filter: &RoomFilter) -> Result<Vec<Room>, RoomError> {
        let mut rows = rooms::list_rooms(&self.pool, filter).await?;
        // Text is matched here so both stores fold case the same way.
        if filter.text.is_some() {
            rows.retain(|row| filter.matches_text(&row.name, &row.description));
        }
        self.with_members(rows).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Room>, RoomError> {
        let Some(row) = rooms::get_room(&self.pool, id).await? else {
            return Ok(None);
        };
        Ok(self.with_members(vec![row]).await?.pop())
    }

    async fn create(&self, new: NewRoom) -> Result<Room, RoomError> {
        let now = Utc::now();
        let row = RoomRow {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            language: new.language,
            is_private: new.is_private,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        rooms::insert_room(&self.pool, &row).await?;

        let owner = HashSet::from([row.created_by.clone()]);
        Ok(room_from_row(row, owner))
    }

    async fn save(&self, room: &Room) -> Result<(), RoomError> {
        let members: Vec<String> = room.members.iter().cloned().collect();
        if !rooms::save_room(&self.pool, &row_from_room(room), &members).await? {
            return Err(RoomError::RoomNotFound(room.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::{create_pool, run_migrations};

    async fn setup_store() -> SqliteRoomStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteRoomStore::new(pool)
    }

    fn new_room(name: &str, owner: &str) -> NewRoom {
        NewRoom {
            name: name.into(),
            description: "pairing".into(),
            language: "Rust".into(),
            is_private: false,
            created_by: owner.into(),
        }
    }

    #[tokio::test]
    async fn test_create_then_find_by_id() {
        let store = setup_store().await;
        let created = store.create(new_room("alpha", "alice")).await.unwrap();

        let found = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(found.is_member("alice"));
    }

    #[tokio::test]
    async fn test_find_by_unknown_id() {
        let store = setup_store().await;
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_persists_membership() {
        let store = setup_store().await;
        let mut room = store.create(new_room("alpha", "alice")).await.unwrap();
        room.members.insert("bob".into());
        room.updated_at = Utc::now();
        store.save(&room).await.unwrap();

        let found = store.find_by_id(&room.id).await.unwrap().unwrap();
        assert_eq!(found.members, room.members);
        assert_eq!(found.updated_at, room.updated_at);
    }

    #[tokio::test]
    async fn test_save_unknown_room_is_not_found() {
        let store = setup_store().await;
        let mut room = store.create(new_room("alpha", "alice")).await.unwrap();
        room.id = "missing".into();
        assert!(matches!(
            store.save(&room).await,
            Err(RoomError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_attaches_members_per_room() {
        let store = setup_store().await;
        let mut a = store.create(new_room("a", "alice")).await.unwrap();
        let b = store.create(new_room("b", "bob")).await.unwrap();
        a.members.insert("carol".into());
        store.save(&a).await.unwrap();

        let rooms = store.find(&RoomFilter::public()).await.unwrap();
        assert_eq!(rooms.len(), 2);
        let found_a = rooms.iter().find(|r| r.id == a.id).unwrap();
        let found_b = rooms.iter().find(|r| r.id == b.id).unwrap();
        assert_eq!(found_a.members.len(), 2);
        assert_eq!(found_b.members, HashSet::from(["bob".to_string()]));
    }

    #[tokio::test]
    async fn test_find_text_folds_unicode_case() {
        let store = setup_store().await;
        let ecole = store.create(new_room("École Rust", "alice")).await.unwrap();
        store.create(new_room("Go", "alice")).await.unwrap();

        let hits = store
            .find(&RoomFilter::public().containing("école"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, ecole.id);

        let hits = store
            .find(&RoomFilter::public().containing("ÉCOLE"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_find_text_is_literal() {
        let store = setup_store().await;
        let percent = store.create(new_room("100% rust", "alice")).await.unwrap();
        store.create(new_room("plain", "alice")).await.unwrap();

        let hits = store
            .find(&RoomFilter::public().containing("%"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, percent.id);
        assert!(store
            .find(&RoomFilter::public().containing("_"))
            .await
            .unwrap()
            .is_empty());
    }
}
