//! Message service (use cases).
//!
//! `MessageService` is the facade the HTTP and WebSocket layers talk to.
//! Two implementations stack on each other:
//!
//! - [`cache_aside::CacheAsideService`] reads through the cache and writes
//!   to the repository first.
//! - [`resilient::ResilientService`] wraps any `MessageService` with
//!   per-class circuit breakers and bounded retry.

pub mod cache_aside;
pub mod resilient;

use std::time::Duration;

use parley_types::error::ServiceError;
use parley_types::message::StoredMessage;
use parley_types::room::Room;

/// Persistence facade for messages, rooms, and user sessions.
pub trait MessageService: Send + Sync {
    /// Persist a message, assigning an ID if it has none. Returns the saved
    /// message.
    fn save_message(
        &self,
        message: StoredMessage,
    ) -> impl std::future::Future<Output = Result<StoredMessage, ServiceError>> + Send;

    /// Page of a room's history, newest first.
    fn get_messages_by_room(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<StoredMessage>, ServiceError>> + Send;

    fn get_message_by_id(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<StoredMessage, ServiceError>> + Send;

    fn create_room(
        &self,
        id: &str,
        name: &str,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Room, ServiceError>> + Send;

    fn get_rooms(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Room>, ServiceError>> + Send;

    fn get_room_by_id(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Room, ServiceError>> + Send;

    /// Mark a room as active now.
    fn update_room_activity(
        &self,
        room_id: &str,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;

    /// Store an opaque session blob. A zero `ttl` means the default (24 h).
    fn set_user_session(
        &self,
        user_id: &str,
        data: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;

    fn get_user_session(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<String, ServiceError>> + Send;

    fn delete_user_session(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;
}
