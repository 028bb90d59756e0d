//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `parley-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool and writes on the single-connection writer.

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::repository::chat::ChatRepository;
use parley_types::error::RepositoryError;
use parley_types::message::{MessageType, StoredMessage};
use parley_types::room::Room;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MessageRow {
    id: String,
    room_id: String,
    user_id: String,
    username: String,
    content: String,
    message_type: String,
    recipient: Option<String>,
    timestamp: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            room_id: row.try_get("room_id")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            content: row.try_get("content")?,
            message_type: row.try_get("message_type")?,
            recipient: row.try_get("recipient")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_message(self) -> Result<StoredMessage, RepositoryError> {
        let message_type: MessageType = self
            .message_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let timestamp = parse_datetime(&self.timestamp)?;

        Ok(StoredMessage {
            id: self.id,
            room_id: self.room_id,
            user_id: self.user_id,
            username: self.username,
            content: self.content,
            message_type,
            timestamp,
            recipient: self.recipient,
        })
    }
}

struct RoomRow {
    id: String,
    name: String,
    owner_id: String,
    created_at: String,
    last_activity_at: String,
}

impl RoomRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
            last_activity_at: row.try_get("last_activity_at")?,
        })
    }

    fn into_room(self) -> Result<Room, RepositoryError> {
        Ok(Room {
            id: self.id,
            name: self.name,
            owner_id: self.owner_id,
            created_at: parse_datetime(&self.created_at)?,
            last_activity_at: parse_datetime(&self.last_activity_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed precision keeps text order equal to time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn save_message(&self, message: &StoredMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO messages (id, room_id, user_id, username, content, message_type, recipient, timestamp)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(&message.user_id)
        .bind(&message.username)
        .bind(&message.content)
        .bind(message.message_type.to_string())
        .bind(&message.recipient)
        .bind(format_datetime(&message.timestamp))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.message().contains("UNIQUE") => {
                RepositoryError::Conflict(format!("message '{}' already exists", message.id))
            }
            _ => RepositoryError::Query(e.to_string()),
        })?;

        Ok(())
    }

    async fn get_messages_by_room(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages
               WHERE room_id = ?
               ORDER BY timestamp DESC, id DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }
        Ok(messages)
    }

    async fn get_message_by_id(&self, id: &str) -> Result<StoredMessage, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .ok_or(RepositoryError::NotFound)?;

        MessageRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_message()
    }

    async fn create_room(&self, room: &Room) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO rooms (id, name, owner_id, created_at, last_activity_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&room.id)
        .bind(&room.name)
        .bind(&room.owner_id)
        .bind(format_datetime(&room.created_at))
        .bind(format_datetime(&room.last_activity_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("room '{}' already exists", room.id)),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_rooms(&self) -> Result<Vec<Room>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM rooms ORDER BY last_activity_at DESC, id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut rooms = Vec::with_capacity(rows.len());
        for row in &rows {
            let room_row =
                RoomRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            rooms.push(room_row.into_room()?);
        }
        Ok(rooms)
    }

    async fn get_room_by_id(&self, id: &str) -> Result<Room, RepositoryError> {
        let row = sqlx::query("SELECT * FROM rooms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .ok_or(RepositoryError::NotFound)?;

        RoomRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_room()
    }

    async fn update_room_activity(
        &self,
        room_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE rooms SET last_activity_at = ? WHERE id = ?")
            .bind(format_datetime(&at))
            .bind(room_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
