//! Connection pools for the chat store.
//!
//! Message appends and room writes share one writer connection. History
//! pages and room listings go through a read-only pool, which WAL lets run
//! alongside an append in progress.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const STORE_FILE: &str = "parley.db";
const READER_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader and writer pools over one SQLite file.
#[derive(Clone)]
pub struct DatabasePool {
    /// Read-only, for history and room queries.
    pub reader: SqlitePool,
    /// Single connection; all inserts and updates.
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open the store at `database_url`, creating and migrating it as needed.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        // Readers open only once migrations have run.
        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(options.read_only(true))
            .await?;

        tracing::debug!(%database_url, "chat store opened");
        Ok(Self { reader, writer })
    }

    /// Open `parley.db` inside `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self, sqlx::Error> {
        Self::new(&database_url(data_dir)).await
    }
}

/// `sqlite://{data_dir}/parley.db`
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}/{STORE_FILE}", data_dir.display())
}
