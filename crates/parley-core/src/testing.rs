//! In-memory repository and cache doubles for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parley_types::error::{CacheError, RepositoryError};
use parley_types::message::StoredMessage;
use parley_types::room::Room;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{self, MessageCache};
use crate::repository::chat::ChatRepository;

#[derive(Default)]
pub struct MockRepository {
    messages: Mutex<Vec<StoredMessage>>,
    rooms: Mutex<HashMap<String, Room>>,
    pub fail: AtomicBool,
    pub calls: AtomicU32,
}

impl MockRepository {
    fn enter(&self) -> Result<(), RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("injected failure".to_string()));
        }
        Ok(())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl ChatRepository for MockRepository {
    async fn save_message(&self, message: &StoredMessage) -> Result<(), RepositoryError> {
        self.enter()?;
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn get_messages_by_room(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        self.enter()?;
        let mut found: Vec<StoredMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(found
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_message_by_id(&self, id: &str) -> Result<StoredMessage, RepositoryError> {
        self.enter()?;
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn create_room(&self, room: &Room) -> Result<(), RepositoryError> {
        self.enter()?;
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(&room.id) {
            return Err(RepositoryError::Conflict(format!("room {}", room.id)));
        }
        rooms.insert(room.id.clone(), room.clone());
        Ok(())
    }

    async fn get_rooms(&self) -> Result<Vec<Room>, RepositoryError> {
        self.enter()?;
        let mut rooms: Vec<Room> = self.rooms.lock().unwrap().values().cloned().collect();
        rooms.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(rooms)
    }

    async fn get_room_by_id(&self, id: &str) -> Result<Room, RepositoryError> {
        self.enter()?;
        self.rooms
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_room_activity(
        &self,
        room_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.enter()?;
        if let Some(room) = self.rooms.lock().unwrap().get_mut(room_id) {
            room.last_activity_at = at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockCache {
    entries: Mutex<HashMap<String, String>>,
    pub fail: AtomicBool,
}

impl MockCache {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn put<T: Serialize + ?Sized>(&self, key: String, value: &T) -> Result<(), CacheError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("injected failure".to_string()));
        }
        let json = serde_json::to_string(value).map_err(|e| CacheError::Codec(e.to_string()))?;
        self.entries.lock().unwrap().insert(key, json);
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("injected failure".to_string()));
        }
        let json = self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(CacheError::Miss)?;
        serde_json::from_str(&json).map_err(|e| CacheError::Codec(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

impl MessageCache for MockCache {
    async fn cache_message(&self, message: &StoredMessage) -> Result<(), CacheError> {
        self.put(cache::message_key(&message.id), message)
    }

    async fn get_cached_message(&self, id: &str) -> Result<StoredMessage, CacheError> {
        self.fetch(&cache::message_key(id))
    }

    async fn evict_message(&self, id: &str) -> Result<(), CacheError> {
        self.remove(&cache::message_key(id))
    }

    async fn cache_room_messages(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
        messages: &[StoredMessage],
    ) -> Result<(), CacheError> {
        self.put(cache::room_messages_key(room_id, limit, offset), messages)
    }

    async fn get_cached_room_messages(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredMessage>, CacheError> {
        self.fetch(&cache::room_messages_key(room_id, limit, offset))
    }

    async fn cache_room(&self, room: &Room) -> Result<(), CacheError> {
        self.put(cache::room_key(&room.id), room)
    }

    async fn get_cached_room(&self, id: &str) -> Result<Room, CacheError> {
        self.fetch(&cache::room_key(id))
    }

    async fn evict_room(&self, id: &str) -> Result<(), CacheError> {
        self.remove(&cache::room_key(id))
    }

    async fn cache_room_list(&self, rooms: &[Room]) -> Result<(), CacheError> {
        self.put(cache::ROOM_LIST_KEY.to_string(), rooms)
    }

    async fn get_cached_room_list(&self) -> Result<Vec<Room>, CacheError> {
        self.fetch(cache::ROOM_LIST_KEY)
    }

    async fn set_session(&self, user_id: &str, data: &str, _ttl: Duration) -> Result<(), CacheError> {
        self.put(cache::session_key(user_id), data)
    }

    async fn get_session(&self, user_id: &str) -> Result<String, CacheError> {
        self.fetch(&cache::session_key(user_id))
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), CacheError> {
        self.remove(&cache::session_key(user_id))
    }
}
