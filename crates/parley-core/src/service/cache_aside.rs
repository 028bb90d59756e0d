//! Cache-aside message service.
//!
//! Reads try the cache first and fall back to the repository on a miss or
//! a cache error, repopulating the cache on the way out. Writes go to the
//! repository first; the cache is refreshed afterwards on a best-effort
//! basis. Empty collections are never served from or written to the cache.
//! Cache failures are logged and never fail a request.

use std::time::Duration;

use chrono::Utc;
use parley_types::error::ServiceError;
use parley_types::message::StoredMessage;
use parley_types::room::Room;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{MessageCache, SESSION_TTL};
use crate::repository::chat::ChatRepository;
use crate::service::MessageService;

/// Message service backed by a repository with a cache in front.
///
/// Generic over `ChatRepository` and `MessageCache` so parley-core never
/// depends on parley-infra.
pub struct CacheAsideService<R: ChatRepository, C: MessageCache> {
    repo: R,
    cache: C,
}

impl<R: ChatRepository, C: MessageCache> CacheAsideService<R, C> {
    pub fn new(repo: R, cache: C) -> Self {
        Self { repo, cache }
    }

    /// Access the repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Access the cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Re-read a room from the repository and cache it. Errors are logged.
    async fn refresh_cached_room(&self, room_id: &str) {
        match self.repo.get_room_by_id(room_id).await {
            Ok(room) => {
                if let Err(e) = self.cache.cache_room(&room).await {
                    debug!(%room_id, error = %e, "failed to cache room");
                }
            }
            Err(e) => debug!(%room_id, error = %e, "room not refreshed in cache"),
        }
    }
}

impl<R: ChatRepository, C: MessageCache> MessageService for CacheAsideService<R, C> {
    async fn save_message(&self, mut message: StoredMessage) -> Result<StoredMessage, ServiceError> {
        if message.id.is_empty() {
            message.id = Uuid::now_v7().to_string();
        }

        self.repo.save_message(&message).await?;

        if let Err(e) = self.cache.cache_message(&message).await {
            debug!(message_id = %message.id, error = %e, "failed to cache message");
        }

        if let Err(e) = self.update_room_activity(&message.room_id).await {
            debug!(room_id = %message.room_id, error = %e, "failed to refresh room activity");
        }

        Ok(message)
    }

    async fn get_messages_by_room(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredMessage>, ServiceError> {
        match self.cache.get_cached_room_messages(room_id, limit, offset).await {
            Ok(messages) if !messages.is_empty() => return Ok(messages),
            Ok(_) => {}
            Err(e) => debug!(%room_id, limit, offset, error = %e, "room messages not served from cache"),
        }

        let messages = self.repo.get_messages_by_room(room_id, limit, offset).await?;

        if !messages.is_empty() {
            if let Err(e) = self
                .cache
                .cache_room_messages(room_id, limit, offset, &messages)
                .await
            {
                debug!(%room_id, error = %e, "failed to cache room messages");
            }
        }

        Ok(messages)
    }

    async fn get_message_by_id(&self, id: &str) -> Result<StoredMessage, ServiceError> {
        match self.cache.get_cached_message(id).await {
            Ok(message) => return Ok(message),
            Err(e) => debug!(message_id = %id, error = %e, "message not served from cache"),
        }

        let message = self.repo.get_message_by_id(id).await?;

        if let Err(e) = self.cache.cache_message(&message).await {
            debug!(message_id = %id, error = %e, "failed to cache message");
        }

        Ok(message)
    }

    async fn create_room(&self, id: &str, name: &str, owner_id: &str) -> Result<Room, ServiceError> {
        let room = Room::new(id, name, owner_id);

        self.repo.create_room(&room).await?;

        if let Err(e) = self.cache.cache_room(&room).await {
            debug!(room_id = %id, error = %e, "failed to cache room");
        }

        match self.repo.get_rooms().await {
            Ok(rooms) if !rooms.is_empty() => {
                if let Err(e) = self.cache.cache_room_list(&rooms).await {
                    debug!(error = %e, "failed to cache room list");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to reload room list after create"),
        }

        Ok(room)
    }

    async fn get_rooms(&self) -> Result<Vec<Room>, ServiceError> {
        match self.cache.get_cached_room_list().await {
            Ok(rooms) if !rooms.is_empty() => return Ok(rooms),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "room list not served from cache"),
        }

        let rooms = self.repo.get_rooms().await?;

        if !rooms.is_empty() {
            if let Err(e) = self.cache.cache_room_list(&rooms).await {
                debug!(error = %e, "failed to cache room list");
            }
        }

        Ok(rooms)
    }

    async fn get_room_by_id(&self, id: &str) -> Result<Room, ServiceError> {
        match self.cache.get_cached_room(id).await {
            Ok(room) => return Ok(room),
            Err(e) => debug!(room_id = %id, error = %e, "room not served from cache"),
        }

        let room = self.repo.get_room_by_id(id).await?;

        if let Err(e) = self.cache.cache_room(&room).await {
            debug!(room_id = %id, error = %e, "failed to cache room");
        }

        Ok(room)
    }

    async fn update_room_activity(&self, room_id: &str) -> Result<(), ServiceError> {
        self.repo.update_room_activity(room_id, Utc::now()).await?;
        self.refresh_cached_room(room_id).await;
        Ok(())
    }

    async fn set_user_session(
        &self,
        user_id: &str,
        data: &str,
        ttl: Duration,
    ) -> Result<(), ServiceError> {
        let ttl = if ttl.is_zero() { SESSION_TTL } else { ttl };
        self.cache.set_session(user_id, data, ttl).await?;
        Ok(())
    }

    async fn get_user_session(&self, user_id: &str) -> Result<String, ServiceError> {
        Ok(self.cache.get_session(user_id).await?)
    }

    async fn delete_user_session(&self, user_id: &str) -> Result<(), ServiceError> {
        self.cache.delete_session(user_id).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
