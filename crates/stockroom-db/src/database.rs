//! # Database Handle
//!
//! Opens the SQLite file that holds the sync engine's records.
//!
//! ```text
//! Database::open(path)
//!     │  create if missing, WAL journal, synchronous = NORMAL
//!     ▼
//! schema::apply(pool)            kv_store table
//!     │
//!     ▼
//! db.kv() ──► KvRepository       get / set / remove
//! ```
//!
//! One engine writes and the inspect tool reads, so the pool stays small.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::kv::KvRepository;
use crate::schema::{self, SchemaStatus};

const MAX_CONNECTIONS: u32 = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const MEMORY_LOCATION: &str = ":memory:";

/// Handle to an opened sync store. Clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    location: String,
}

impl Database {
    /// Opens (or creates) the store at `path` and brings its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // may lose the last write on power loss, never corrupts
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| DbError::open(&path.display().to_string(), e))?;

        Self::ready(pool, path.display().to_string()).await
    }

    /// Opens a private in-memory store. Its contents go away with the handle.
    pub async fn in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DbError::open(MEMORY_LOCATION, e))?;

        // Each connection would get its own empty database, so keep exactly
        // one alive for the life of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| DbError::open(MEMORY_LOCATION, e))?;

        Self::ready(pool, MEMORY_LOCATION.to_string()).await
    }

    async fn ready(pool: SqlitePool, location: String) -> DbResult<Self> {
        schema::apply(&pool).await?;
        info!(location = %location, "Sync store opened");
        Ok(Database { pool, location })
    }

    /// File path the store was opened from, or `:memory:`.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn kv(&self) -> KvRepository {
        KvRepository::new(self.pool.clone())
    }

    pub async fn schema_status(&self) -> DbResult<SchemaStatus> {
        schema::status(&self.pool).await
    }

    /// Closes the pool. Later reads and writes fail with [`DbError::Closed`].
    pub async fn close(&self) {
        info!(location = %self.location, "Closing sync store");
        self.pool.close().await;
    }
}
