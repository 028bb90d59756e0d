//! Application state wiring the hub and message services together.
//!
//! The core services are generic over repository and cache traits; AppState
//! pins them to the SQLite repository and the in-memory cache.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parley_core::hub::{Hub, HubHandle};
use parley_core::service::MessageService;
use parley_core::service::cache_aside::CacheAsideService;
use parley_core::service::resilient::ResilientService;
use parley_infra::cache::InMemoryCache;
use parley_infra::sqlite::chat::SqliteChatRepository;
use parley_infra::sqlite::pool::DatabasePool;
use parley_types::config::ServerConfig;

/// How often expired cache entries are reclaimed.
const CACHE_SWEEP_PERIOD: Duration = Duration::from_secs(60);

pub type ConcreteMessageService =
    ResilientService<CacheAsideService<SqliteChatRepository, InMemoryCache>>;

/// Shared application state for CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub messages: Arc<ConcreteMessageService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open the database, start the cache sweeper and the hub worker.
    pub async fn init(data_dir: &Path, config: ServerConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;

        let db_pool = DatabasePool::open(data_dir).await?;

        let cache = InMemoryCache::new();
        cache.spawn_sweeper(CACHE_SWEEP_PERIOD);

        let base = CacheAsideService::new(SqliteChatRepository::new(db_pool), cache);
        let messages = ResilientService::new(base, &config.breaker, &config.retry);

        let hub = Hub::spawn(&config.hub);

        Ok(Self {
            hub,
            messages: Arc::new(messages),
            config: Arc::new(config),
        })
    }

    /// Register every persisted room with the hub so clients can join
    /// rooms created before a restart. Returns how many were registered.
    pub async fn restore_rooms(&self) -> usize {
        let rooms = match self.messages.get_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(error = %e, "could not load persisted rooms");
                return 0;
            }
        };

        let mut restored = 0;
        for room in &rooms {
            if self.hub.create_room(&room.id, &room.name, &room.owner_id).await {
                restored += 1;
            }
        }
        restored
    }
}
