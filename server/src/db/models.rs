use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored room from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub language: String,
    pub is_private: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A room membership record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomMemberRow {
    pub room_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}
