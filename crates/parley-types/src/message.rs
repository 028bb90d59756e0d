//! Chat message types for Parley.
//!
//! `ChatMessage` is the in-flight form exchanged over WebSocket connections
//! and fanned out by the hub. `StoredMessage` is its durable projection.
//! `WireMessage` is the lenient inbound decoding target: every field is
//! optional so partially-filled frames can be completed with connection
//! defaults before dispatch.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Kind of chat message.
///
/// Serialized as the lowercase variant name (`"chat"`, `"typing"`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Regular chat message.
    #[default]
    Chat,
    /// A user joined the room.
    Join,
    /// A user left the room.
    Leave,
    /// Server-originated notice.
    System,
    /// Message addressed to a single user in the room.
    Private,
    /// Error notice.
    Error,
    /// Typing indicator (content is `"true"` or `"false"`).
    Typing,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Chat => "chat",
            MessageType::Join => "join",
            MessageType::Leave => "leave",
            MessageType::System => "system",
            MessageType::Private => "private",
            MessageType::Error => "error",
            MessageType::Typing => "typing",
        };
        f.write_str(s)
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(MessageType::Chat),
            "join" => Ok(MessageType::Join),
            "leave" => Ok(MessageType::Leave),
            "system" => Ok(MessageType::System),
            "private" => Ok(MessageType::Private),
            "error" => Ok(MessageType::Error),
            "typing" => Ok(MessageType::Typing),
            other => Err(format!("invalid message type: '{other}'")),
        }
    }
}

/// A chat message in flight between connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message ID, if one was supplied or assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    pub room_id: String,
    /// Display name of the sender.
    pub username: String,
    pub timestamp: DateTime<Utc>,
    /// Target username for private messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl ChatMessage {
    /// Build a message stamped with the current time.
    pub fn new(
        message_type: MessageType,
        room_id: impl Into<String>,
        username: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            message_type,
            content: content.into(),
            room_id: room_id.into(),
            username: username.into(),
            timestamp: Utc::now(),
            recipient: None,
        }
    }

    /// Plain chat message.
    pub fn chat(
        room_id: impl Into<String>,
        username: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(MessageType::Chat, room_id, username, content)
    }

    /// Private message to `recipient`.
    pub fn private(
        room_id: impl Into<String>,
        username: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(MessageType::Private, room_id, username, content);
        msg.recipient = Some(recipient.into());
        msg
    }

    /// Returns the recipient when this is a private message with a non-empty target.
    pub fn private_recipient(&self) -> Option<&str> {
        if self.message_type != MessageType::Private {
            return None;
        }
        self.recipient.as_deref().filter(|r| !r.is_empty())
    }
}

/// Lenient decoding target for inbound frames.
///
/// Missing or empty fields are filled from the connection's identity by
/// [`WireMessage::normalize`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recipient: Option<String>,
}

impl WireMessage {
    /// Fill defaults and produce a `ChatMessage`.
    ///
    /// - type: absent, empty, or unrecognized -> `chat`
    /// - room / username: absent or empty -> the connection's values
    /// - timestamp: absent or the zero time (year 1) -> `now`
    pub fn normalize(self, room_id: &str, username: &str, now: DateTime<Utc>) -> ChatMessage {
        let message_type = self
            .message_type
            .as_deref()
            .and_then(|t| t.parse::<MessageType>().ok())
            .unwrap_or_default();

        let timestamp = match self.timestamp {
            Some(ts) if ts.year() > 1 => ts,
            _ => now,
        };

        ChatMessage {
            id: non_empty(self.id),
            message_type,
            content: self.content.unwrap_or_default(),
            room_id: non_empty(self.room_id).unwrap_or_else(|| room_id.to_string()),
            username: non_empty(self.username).unwrap_or_else(|| username.to_string()),
            timestamp,
            recipient: non_empty(self.recipient),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Durable projection of a [`ChatMessage`].
///
/// Ordered by `timestamp`. `id` is empty until the message service assigns
/// one on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl StoredMessage {
    /// Project an in-flight message for persistence.
    pub fn from_chat(msg: &ChatMessage, user_id: impl Into<String>) -> Self {
        Self {
            id: msg.id.clone().unwrap_or_default(),
            room_id: msg.room_id.clone(),
            user_id: user_id.into(),
            username: msg.username.clone(),
            content: msg.content.clone(),
            message_type: msg.message_type,
            timestamp: msg.timestamp,
            recipient: msg.recipient.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
