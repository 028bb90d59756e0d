//! ChatRepository trait definition.
//!
//! Durable storage for chat messages and rooms. The store is the source of
//! truth; the cache in front of it is best-effort.

use chrono::{DateTime, Utc};
use parley_types::error::RepositoryError;
use parley_types::message::StoredMessage;
use parley_types::room::Room;

/// Repository trait for message and room persistence.
///
/// Implementations live in parley-infra (e.g., `SqliteChatRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRepository: Send + Sync {
    /// Persist a message. The caller assigns the ID.
    fn save_message(
        &self,
        message: &StoredMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Messages for a room, newest first.
    fn get_messages_by_room(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<StoredMessage>, RepositoryError>> + Send;

    /// Get a message by ID. Returns `NotFound` if absent.
    fn get_message_by_id(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<StoredMessage, RepositoryError>> + Send;

    /// Insert a room. Returns `Conflict` if the ID is taken.
    fn create_room(
        &self,
        room: &Room,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All rooms, most recently active first.
    fn get_rooms(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Room>, RepositoryError>> + Send;

    /// Get a room by ID. Returns `NotFound` if absent.
    fn get_room_by_id(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Room, RepositoryError>> + Send;

    /// Set a room's last activity time. Unknown rooms are ignored.
    fn update_room_activity(
        &self,
        room_id: &str,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
