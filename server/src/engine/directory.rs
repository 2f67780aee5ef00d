use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use super::reconciler::{EnrichedRoom, PresenceReconciler};
use super::room::{CreateRoom, LeaveOutcome, NewRoom, Room};
use super::room_store::{RoomFilter, RoomStore};
use super::validation;
use crate::error::RoomError;

/// Language assigned to rooms created without one.
pub const DEFAULT_ROOM_LANGUAGE: &str = "JavaScript";

/// Outward-facing room operations: lifecycle, membership and discovery.
///
/// Membership changes on one room are serialized through a per-room lock
/// so that two concurrent joins cannot overwrite each other's update.
pub struct RoomDirectory {
    store: Arc<dyn RoomStore>,
    reconciler: PresenceReconciler,
    room_locks: DashMap<String, Arc<Mutex<()>>>,
    default_language: String,
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn RoomStore>, reconciler: PresenceReconciler) -> Self {
        Self {
            store,
            reconciler,
            room_locks: DashMap::new(),
            default_language: DEFAULT_ROOM_LANGUAGE.to_string(),
        }
    }

    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    /// Create a room owned by `owner_id`, who becomes its first member.
    pub async fn create_room(&self, fields: CreateRoom, owner_id: &str) -> Result<Room, RoomError> {
        validation::validate_room_name(&fields.name).map_err(RoomError::Validation)?;

        let description = fields.description.unwrap_or_default();
        validation::validate_description(&description).map_err(RoomError::Validation)?;

        let language = match fields.language {
            Some(language) if !language.trim().is_empty() => language.trim().to_string(),
            _ => self.default_language.clone(),
        };
        validation::validate_language(&language).map_err(RoomError::Validation)?;

        let room = self
            .store
            .create(NewRoom {
                name: fields.name.trim().to_string(),
                description,
                language,
                is_private: fields.is_private,
                created_by: owner_id.to_string(),
            })
            .await?;

        info!(room_id = %room.id, name = %room.name, %owner_id, "room created");
        Ok(room)
    }

    /// Add a user to a room. Joining a room you already belong to is a no-op.
    pub async fn join_room(&self, room_id: &str, user_id: &str) -> Result<Room, RoomError> {
        self.update_membership(room_id, |room| {
            if room.members.insert(user_id.to_string()) {
                info!(%room_id, %user_id, "joined room");
                true
            } else {
                false
            }
        })
        .await
        .map(|(room, _)| room)
    }

    /// Remove a user from a room. The owner always stays a member.
    pub async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<LeaveOutcome, RoomError> {
        let mut outcome = LeaveOutcome::NotMember;
        self.update_membership(room_id, |room| {
            if room.is_owner(user_id) {
                outcome = LeaveOutcome::OwnerRetained;
                return false;
            }
            if room.members.remove(user_id) {
                info!(%room_id, %user_id, "left room");
                outcome = LeaveOutcome::Left;
                true
            } else {
                false
            }
        })
        .await?;
        Ok(outcome)
    }

    /// All public rooms with live activity.
    pub async fn list_public_rooms(&self) -> Result<Vec<EnrichedRoom>, RoomError> {
        let rooms = self.store.find(&RoomFilter::public()).await?;
        Ok(self.reconciler.activity_snapshot_batch(rooms))
    }

    pub async fn get_room(&self, room_id: &str) -> Result<EnrichedRoom, RoomError> {
        let room = self
            .store
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?;
        Ok(self.reconciler.activity_snapshot(room))
    }

    /// Rooms created by `owner_id`. No presence enrichment.
    pub async fn list_my_rooms(&self, owner_id: &str) -> Result<Vec<Room>, RoomError> {
        self.store.find(&RoomFilter::owned_by(owner_id)).await
    }

    /// Public rooms whose name or description contains `query`, ignoring case.
    /// The query is literal text, whitespace included; an empty query
    /// matches every public room.
    pub async fn search_rooms(&self, query: &str) -> Result<Vec<Room>, RoomError> {
        validation::validate_search_query(query).map_err(RoomError::Validation)?;

        let filter = if query.is_empty() {
            RoomFilter::public()
        } else {
            RoomFilter::public().containing(query)
        };
        self.store.find(&filter).await
    }

    /// Whether a room exists in the store.
    pub async fn room_exists(&self, room_id: &str) -> Result<bool, RoomError> {
        Ok(self.store.find_by_id(room_id).await?.is_some())
    }

    /// Read-modify-write of one room's member set under that room's lock.
    /// `apply` returns whether it changed anything; only changes are saved.
    async fn update_membership<F>(&self, room_id: &str, apply: F) -> Result<(Room, bool), RoomError>
    where
        F: FnOnce(&mut Room) -> bool,
    {
        let lock = self.room_lock(room_id);
        let guard = lock.lock().await;

        let Some(mut room) = self.store.find_by_id(room_id).await? else {
            drop(guard);
            drop(lock);
            // Don't let lookups of unknown IDs grow the lock table.
            self.room_locks
                .remove_if(room_id, |_, l| Arc::strong_count(l) == 1);
            return Err(RoomError::RoomNotFound(room_id.to_string()));
        };

        let changed = apply(&mut room);
        if changed {
            room.updated_at = Utc::now();
            self.store.save(&room).await?;
        }
        Ok((room, changed))
    }

    fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id.to_string())
            .or_default()
            .clone()
    }
}
