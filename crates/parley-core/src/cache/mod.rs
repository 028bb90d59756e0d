//! Cache trait definition and key layout.
//!
//! The cache sits in front of the `ChatRepository` and holds JSON copies of
//! messages, room-message pages, rooms, the room list, and opaque session
//! blobs. Adapters apply the expirations defined here.

use std::time::Duration;

use parley_types::error::CacheError;
use parley_types::message::StoredMessage;
use parley_types::room::Room;

const HOUR: u64 = 60 * 60;

pub const MESSAGE_TTL: Duration = Duration::from_secs(24 * HOUR);
pub const ROOM_MESSAGES_TTL: Duration = Duration::from_secs(24 * HOUR);
pub const ROOM_TTL: Duration = Duration::from_secs(72 * HOUR);
pub const ROOM_LIST_TTL: Duration = Duration::from_secs(72 * HOUR);
/// Applied when a session is stored with a zero expiration.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * HOUR);

pub const ROOM_LIST_KEY: &str = "rooms:list";

pub fn message_key(id: &str) -> String {
    format!("message:{id}")
}

pub fn room_key(id: &str) -> String {
    format!("room:{id}")
}

/// One cached page of a room's history. Pages are keyed by their shape so
/// a request never receives a page of a different size or position.
pub fn room_messages_key(room_id: &str, limit: i64, offset: i64) -> String {
    format!("room:{room_id}:messages:{limit}:{offset}")
}

pub fn session_key(user_id: &str) -> String {
    format!("session:{user_id}")
}

/// Cache port for the message service.
///
/// Lookups return `CacheError::Miss` when the key is absent or expired.
pub trait MessageCache: Send + Sync {
    fn cache_message(
        &self,
        message: &StoredMessage,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn get_cached_message(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<StoredMessage, CacheError>> + Send;

    fn evict_message(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn cache_room_messages(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
        messages: &[StoredMessage],
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn get_cached_room_messages(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<StoredMessage>, CacheError>> + Send;

    fn cache_room(
        &self,
        room: &Room,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn get_cached_room(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Room, CacheError>> + Send;

    fn evict_room(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn cache_room_list(
        &self,
        rooms: &[Room],
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn get_cached_room_list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Room>, CacheError>> + Send;

    fn set_session(
        &self,
        user_id: &str,
        data: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn get_session(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<String, CacheError>> + Send;

    fn delete_session(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(message_key("m-1"), "message:m-1");
        assert_eq!(room_key("lobby"), "room:lobby");
        assert_eq!(room_messages_key("lobby", 50, 0), "room:lobby:messages:50:0");
        assert_eq!(session_key("u-1"), "session:u-1");
    }

    #[test]
    fn test_room_entries_outlive_message_entries() {
        assert!(ROOM_TTL > MESSAGE_TTL);
        assert_eq!(ROOM_LIST_TTL, ROOM_TTL);
        assert_eq!(SESSION_TTL, Duration::from_secs(86_400));
    }
}
