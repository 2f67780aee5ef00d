use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable record of a room and its declared members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub description: String,
    pub language: String,
    pub is_private: bool,
    /// Owner identity. Always present in `members`.
    pub created_by: String,
    /// User IDs with persistent membership, independent of presence.
    pub members: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Most recent durable change to the room.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.updated_at.max(self.created_at)
    }
}

/// Client-supplied fields for a new room.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRoom {
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// Validated, defaulted fields handed to the store. The store assigns the
/// ID and timestamps and records the owner as the first member.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub description: String,
    pub language: String,
    pub is_private: bool,
    pub created_by: String,
}

/// Result of a leave request. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveOutcome {
    /// The user was a member and has been removed.
    Left,
    /// The user was not a member; nothing changed.
    NotMember,
    /// The owner asked to leave their own room; membership is kept.
    OwnerRetained,
}

impl LeaveOutcome {
    pub fn message(self) -> &'static str {
        match self {
            LeaveOutcome::Left => "Left room",
            LeaveOutcome::NotMember => "Not a member of this room",
            LeaveOutcome::OwnerRetained => "Room owners cannot leave their own room",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_room() -> Room {
        let now = Utc::now();
        Room {
            id: "r1".into(),
            name: "alpha".into(),
            description: String::new(),
            language: "Rust".into(),
            is_private: false,
            created_by: "alice".into(),
            members: HashSet::from(["alice".to_string()]),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_last_activity_is_latest_timestamp() {
        let mut room = sample_room();
        room.updated_at = room.created_at + Duration::minutes(5);
        assert_eq!(room.last_activity(), room.updated_at);

        // Clock skew in stored data should not move activity backwards.
        room.updated_at = room.created_at - Duration::minutes(5);
        assert_eq!(room.last_activity(), room.created_at);
    }

    #[test]
    fn test_membership_helpers() {
        let room = sample_room();
        assert!(room.is_member("alice"));
        assert!(room.is_owner("alice"));
        assert!(!room.is_member("bob"));
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn test_create_room_request_defaults() {
        let req: CreateRoom = serde_json::from_str(r#"{"name": "alpha"}"#).unwrap();
        assert_eq!(req.name, "alpha");
        assert!(req.description.is_none());
        assert!(req.language.is_none());
        assert!(!req.is_private);
    }

    #[test]
    fn test_create_room_request_missing_name_fails() {
        assert!(serde_json::from_str::<CreateRoom>(r#"{"language": "Go"}"#).is_err());
    }

    #[test]
    fn test_leave_outcome_serializes_snake_case() {
        let json = serde_json::to_value(LeaveOutcome::OwnerRetained).unwrap();
        assert_eq!(json, "owner_retained");
    }
}
