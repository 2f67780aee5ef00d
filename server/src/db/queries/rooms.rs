use std::collections::HashSet;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::models::{RoomMemberRow, RoomRow};
use crate::engine::room_store::RoomFilter;

/// Insert a room and record its owner as the first member.
pub async fn insert_room(pool: &SqlitePool, room: &RoomRow) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO rooms (id, name, description, language, is_private, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&room.id)
    .bind(&room.name)
    .bind(&room.description)
    .bind(&room.language)
    .bind(room.is_private)
    .bind(&room.created_by)
    .bind(room.created_at)
    .bind(room.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)")
        .bind(&room.id)
        .bind(&room.created_by)
        .bind(room.created_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

/// Get a room by ID.
pub async fn get_room(pool: &SqlitePool, room_id: &str) -> Result<Option<RoomRow>, sqlx::Error> {
    sqlx::query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = ?")
        .bind(room_id)
        .fetch_optional(pool)
        .await
}

/// List rooms matching a filter's privacy and owner predicates, oldest first.
/// The text predicate is not applied here: SQLite `LIKE` only folds ASCII
/// case, so callers match text with [`RoomFilter::matches_text`].
pub async fn list_rooms(pool: &SqlitePool, filter: &RoomFilter) -> Result<Vec<RoomRow>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM rooms WHERE 1 = 1");

    if let Some(is_private) = filter.is_private {
        qb.push(" AND is_private = ").push_bind(is_private);
    }
    if let Some(owner) = &filter.created_by {
        qb.push(" AND created_by = ").push_bind(owner.clone());
    }
    qb.push(" ORDER BY created_at, id");

    qb.build_query_as::<RoomRow>().fetch_all(pool).await
}

/// Upper bound on `?` placeholders per statement, well under SQLite's variable limit.
pub(crate) const BIND_CHUNK_SIZE: usize = 500;

/// Get the members of several rooms at once, oldest membership first.
pub async fn get_members_for_rooms(
    pool: &SqlitePool,
    room_ids: &[String],
) -> Result<Vec<RoomMemberRow>, sqlx::Error> {
    let mut rows = Vec::new();
    for chunk in room_ids.chunks(BIND_CHUNK_SIZE) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT room_id, user_id, joined_at FROM room_members WHERE room_id IN (",
        );
        let mut ids = qb.separated(", ");
        for id in chunk {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(")");
        rows.extend(qb.build_query_as::<RoomMemberRow>().fetch_all(pool).await?);
    }
    rows.sort_by_key(|m| m.joined_at);
    Ok(rows)
}

/// Overwrite a room's fields and member set in one transaction.
/// Existing members keep their original `joined_at`. Returns false if the room does not exist.
pub async fn save_room(
    pool: &SqlitePool,
    room: &RoomRow,
    members: &[String],
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE rooms SET name = ?, description = ?, language = ?, is_private = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&room.name)
    .bind(&room.description)
    .bind(&room.language)
    .bind(room.is_private)
    .bind(room.updated_at)
    .bind(&room.id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(false);
    }

    let current: Vec<String> =
        sqlx::query_scalar("SELECT user_id FROM room_members WHERE room_id = ?")
            .bind(&room.id)
            .fetch_all(&mut *tx)
            .await?;
    let keep: HashSet<&str> = members.iter().map(String::as_str).collect();
    let stale: Vec<&str> = current
        .iter()
        .map(String::as_str)
        .filter(|user_id| !keep.contains(user_id))
        .collect();

    for chunk in stale.chunks(BIND_CHUNK_SIZE) {
        let mut delete: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM room_members WHERE room_id = ");
        delete.push_bind(room.id.as_str());
        delete.push(" AND user_id IN (");
        let mut ids = delete.separated(", ");
        for user_id in chunk {
            ids.push_bind(*user_id);
        }
        ids.push_unseparated(")");
        delete.build().execute(&mut *tx).await?;
    }

    for member in members {
        sqlx::query("INSERT OR IGNORE INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(&room.id)
            .bind(member)
            .bind(room.updated_at)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(true)
}
