//! # Schema
//!
//! The `kv_store` table is created by the embedded migrations in
//! `migrations/sqlite/`. They run every time a [`Database`](crate::Database)
//! is opened; already-applied files are skipped.
//!
//! New files get the next `NNN_` prefix. Applied files are never edited.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

/// How far an opened store's schema has been brought forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Migrations embedded in this build.
    pub known: usize,
    /// Migrations recorded as applied in the file.
    pub applied: usize,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.known
    }
}

pub(crate) async fn apply(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DbError::Schema(e.to_string()))?;

    debug!(migrations = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

pub(crate) async fn status(pool: &SqlitePool) -> DbResult<SchemaStatus> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .map_err(|e| DbError::Schema(e.to_string()))?;

    Ok(SchemaStatus {
        known: MIGRATOR.migrations.len(),
        applied: usize::try_from(applied).unwrap_or(0),
    })
}
