//! In-process expiring key-value cache.
//!
//! Entries are JSON strings stored in a `DashMap` with a deadline. Expired
//! entries are treated as absent on read and removed lazily; a background
//! sweeper can be spawned to reclaim entries that are never read again.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parley_core::cache::{
    MESSAGE_TTL, MessageCache, ROOM_LIST_KEY, ROOM_LIST_TTL, ROOM_MESSAGES_TTL, ROOM_TTL,
    SESSION_TTL, message_key, room_key, room_messages_key, session_key,
};
use parley_types::error::CacheError;
use parley_types::message::StoredMessage;
use parley_types::room::Room;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

/// Shared in-memory cache. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn put<T: Serialize + ?Sized>(
        &self,
        key: String,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value).map_err(|e| CacheError::Codec(e.to_string()))?;
        self.put_raw(key, payload, ttl);
        Ok(())
    }

    fn put_raw(&self, key: String, payload: String, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn fetch_raw(&self, key: &str) -> Result<String, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(entry.payload.clone());
            }
        }
        // Guard dropped above; removing while holding it would deadlock.
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Err(CacheError::Miss)
    }

    fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        let payload = self.fetch_raw(key)?;
        serde_json::from_str(&payload).map_err(|e| CacheError::Codec(e.to_string()))
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Run [`purge_expired`](Self::purge_expired) every `period` until the
    /// returned task is aborted.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = cache.len(), "cache sweep");
                }
            }
        })
    }
}

impl MessageCache for InMemoryCache {
    async fn cache_message(&self, message: &StoredMessage) -> Result<(), CacheError> {
        self.put(message_key(&message.id), message, MESSAGE_TTL)
    }

    async fn get_cached_message(&self, id: &str) -> Result<StoredMessage, CacheError> {
        self.fetch(&message_key(id))
    }

    async fn evict_message(&self, id: &str) -> Result<(), CacheError> {
        self.remove(&message_key(id));
        Ok(())
    }

    async fn cache_room_messages(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
        messages: &[StoredMessage],
    ) -> Result<(), CacheError> {
        self.put(
            room_messages_key(room_id, limit, offset),
            messages,
            ROOM_MESSAGES_TTL,
        )
    }

    async fn get_cached_room_messages(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredMessage>, CacheError> {
        self.fetch(&room_messages_key(room_id, limit, offset))
    }

    async fn cache_room(&self, room: &Room) -> Result<(), CacheError> {
        self.put(room_key(&room.id), room, ROOM_TTL)
    }

    async fn get_cached_room(&self, id: &str) -> Result<Room, CacheError> {
        self.fetch(&room_key(id))
    }

    async fn evict_room(&self, id: &str) -> Result<(), CacheError> {
        self.remove(&room_key(id));
        Ok(())
    }

    async fn cache_room_list(&self, rooms: &[Room]) -> Result<(), CacheError> {
        self.put(ROOM_LIST_KEY.to_string(), rooms, ROOM_LIST_TTL)
    }

    async fn get_cached_room_list(&self) -> Result<Vec<Room>, CacheError> {
        self.fetch(ROOM_LIST_KEY)
    }

    async fn set_session(&self, user_id: &str, data: &str, ttl: Duration) -> Result<(), CacheError> {
        let ttl = if ttl.is_zero() { SESSION_TTL } else { ttl };
        self.put_raw(session_key(user_id), data.to_string(), ttl);
        Ok(())
    }

    async fn get_session(&self, user_id: &str) -> Result<String, CacheError> {
        self.fetch_raw(&session_key(user_id))
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), CacheError> {
        self.remove(&session_key(user_id));
        Ok(())
    }
}
