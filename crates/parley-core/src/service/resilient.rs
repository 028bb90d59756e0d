//! Resilient message service.
//!
//! Wraps any `MessageService` with two circuit breakers and a shared retry
//! policy. Message operations (save, get by id, room history) run behind
//! the message breaker; room operations (create, get, list, activity) run
//! behind the room breaker. Every attempt of a retried call passes through
//! its breaker, so an open breaker is retried until the budget runs out.
//! Session operations bypass both.

use std::time::Duration;

use parley_types::config::{BreakerConfig, RetryConfig};
use parley_types::error::ServiceError;
use parley_types::message::StoredMessage;
use parley_types::room::Room;

use crate::resilience::{BreakerSettings, CircuitBreaker, RetryPolicy};
use crate::service::MessageService;

/// `MessageService` decorator adding circuit breaking and retry.
pub struct ResilientService<S: MessageService> {
    inner: S,
    messages: CircuitBreaker,
    rooms: CircuitBreaker,
    retry: RetryPolicy,
}

impl<S: MessageService> ResilientService<S> {
    /// Build with breakers named `{breaker.name}-messages` and
    /// `{breaker.name}-rooms`.
    pub fn new(inner: S, breaker: &BreakerConfig, retry: &RetryConfig) -> Self {
        Self::with_policies(
            inner,
            CircuitBreaker::new(BreakerSettings::from_config(breaker, "messages")),
            CircuitBreaker::new(BreakerSettings::from_config(breaker, "rooms")),
            RetryPolicy::from_config(retry),
        )
    }

    pub fn with_policies(
        inner: S,
        messages: CircuitBreaker,
        rooms: CircuitBreaker,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            messages,
            rooms,
            retry,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn message_breaker(&self) -> &CircuitBreaker {
        &self.messages
    }

    pub fn room_breaker(&self) -> &CircuitBreaker {
        &self.rooms
    }
}

impl<S: MessageService> MessageService for ResilientService<S> {
    async fn save_message(&self, message: StoredMessage) -> Result<StoredMessage, ServiceError> {
        let inner = &self.inner;
        let breaker = &self.messages;
        self.retry
            .run(move || {
                let message = message.clone();
                breaker.call(move || inner.save_message(message))
            })
            .await
    }

    async fn get_messages_by_room(
        &self,
        room_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredMessage>, ServiceError> {
        let inner = &self.inner;
        let breaker = &self.messages;
        self.retry
            .run(move || breaker.call(move || inner.get_messages_by_room(room_id, limit, offset)))
            .await
    }

    async fn get_message_by_id(&self, id: &str) -> Result<StoredMessage, ServiceError> {
        let inner = &self.inner;
        let breaker = &self.messages;
        self.retry
            .run(move || breaker.call(move || inner.get_message_by_id(id)))
            .await
    }

    async fn create_room(&self, id: &str, name: &str, owner_id: &str) -> Result<Room, ServiceError> {
        let inner = &self.inner;
        let breaker = &self.rooms;
        self.retry
            .run(move || breaker.call(move || inner.create_room(id, name, owner_id)))
            .await
    }

    async fn get_rooms(&self) -> Result<Vec<Room>, ServiceError> {
        let inner = &self.inner;
        let breaker = &self.rooms;
        self.retry
            .run(move || breaker.call(move || inner.get_rooms()))
            .await
    }

    async fn get_room_by_id(&self, id: &str) -> Result<Room, ServiceError> {
        let inner = &self.inner;
        let breaker = &self.rooms;
        self.retry
            .run(move || breaker.call(move || inner.get_room_by_id(id)))
            .await
    }

    async fn update_room_activity(&self, room_id: &str) -> Result<(), ServiceError> {
        let inner = &self.inner;
        let breaker = &self.rooms;
        self.retry
            .run(move || breaker.call(move || inner.update_room_activity(room_id)))
            .await
    }

    async fn set_user_session(
        &self,
        user_id: &str,
        data: &str,
        ttl: Duration,
    ) -> Result<(), ServiceError> {
        self.inner.set_user_session(user_id, data, ttl).await
    }

    async fn get_user_session(&self, user_id: &str) -> Result<String, ServiceError> {
        self.inner.get_user_session(user_id).await
    }

    async fn delete_user_session(&self, user_id: &str) -> Result<(), ServiceError> {
        self.inner.delete_user_session(user_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;
    use crate::service::cache_aside::CacheAsideService;
    use crate::testing::{MockCache, MockRepository};
    use parley_types::message::ChatMessage;

    type Service = ResilientService<CacheAsideService<MockRepository, MockCache>>;

    fn service() -> Service {
        ResilientService::new(
            CacheAsideService::new(MockRepository::default(), MockCache::default()),
            &BreakerConfig::default(),
            &RetryConfig::default(),
        )
    }

    fn repo(svc: &Service) -> &MockRepository {
        svc.inner().repo()
    }

    fn stored(content: &str) -> StoredMessage {
        StoredMessage::from_chat(&ChatMessage::chat("lobby", "alice", content), "user-1")
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_through_when_healthy() {
        let svc = service();
        svc.create_room("lobby", "Lobby", "system").await.unwrap();
        let saved = svc.save_message(stored("hello")).await.unwrap();

        let fetched = svc.get_message_by_id(&saved.id).await.unwrap();
        assert_eq!(fetched.content, "hello");
        assert_eq!(svc.message_breaker().state(), CircuitState::Closed);
        assert_eq!(svc.room_breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let svc = service();
        let result = svc.get_room_by_id("missing").await;

        assert!(matches!(result, Err(ServiceError::NotFound)));
        assert_eq!(repo(&svc).calls(), 1);
        assert_eq!(svc.room_breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_opens_breaker_and_exhausts_retries() {
        let svc = service();
        repo(&svc).set_failing(true);

        let result = svc.get_rooms().await;
        match result {
            Err(ServiceError::RetriesExhausted { source, .. }) => {
                assert!(matches!(*source, ServiceError::CircuitOpen(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }

        // Tripped after three failures; later attempts were refused by the
        // breaker or admitted as half-open trials, which failed.
        assert!(repo(&svc).calls() < 20);
        assert_eq!(svc.room_breaker().state(), CircuitState::Open);
        assert_eq!(svc.message_breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_retry_budget() {
        let svc = service();
        repo(&svc).set_failing(true);

        let recover = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            repo(&svc).set_failing(false);
        };
        let (result, ()) = tokio::join!(svc.get_rooms(), recover);

        assert!(result.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_fails_fast_for_its_class_only() {
        let svc = service();
        repo(&svc).set_failing(true);
        let _ = svc.get_rooms().await;
        assert_eq!(svc.room_breaker().state(), CircuitState::Open);

        repo(&svc).set_failing(false);
        // Message class is unaffected.
        let messages = svc.get_messages_by_room("lobby", 50, 0).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_bypass_breakers() {
        let svc = service();
        svc.set_user_session("u-1", "blob", Duration::ZERO).await.unwrap();
        assert_eq!(svc.get_user_session("u-1").await.unwrap(), "blob");
        assert_eq!(svc.message_breaker().counts().requests, 0);
        assert_eq!(svc.room_breaker().counts().requests, 0);
    }
}
