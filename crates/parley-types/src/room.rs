//! Room types.
//!
//! `Room` is the durable record. The hub keeps its own live projection with
//! membership; `RoomSummary` and `MemberSummary` are what it reports back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner recorded for rooms created through the WebSocket endpoint.
pub const SYSTEM_OWNER: &str = "system";

/// A chat room as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Room {
    /// New room with creation and activity times set to now.
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
            created_at: now,
            last_activity_at: now,
        }
    }
}

/// Room listing entry reported by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    /// Connections currently in the room.
    pub members: usize,
    pub last_activity_at: DateTime<Utc>,
}

/// Member listing entry reported by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub id: String,
    pub username: String,
    /// Last typing change or keepalive answer.
    pub last_active_at: DateTime<Utc>,
}
