//! # Key-Value Repository
//!
//! Whole-record storage: one JSON document per key.
//!
//! ## Write Semantics
//! ```text
//! set(key, value)
//!     │
//!     ▼
//! INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
//! ON CONFLICT(key) DO UPDATE SET value = excluded.value,
//!                                updated_at = excluded.updated_at
//! ```
//!
//! Every write replaces the full record. There is no partial update and no
//! cross-key transaction.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Repository for the `kv_store` table.
#[derive(Debug, Clone)]
pub struct KvRepository {
    pool: SqlitePool,
}

impl KvRepository {
    /// Creates a new KvRepository.
    pub fn new(pool: SqlitePool) -> Self {
        KvRepository { pool }
    }

    /// Reads the value stored under `key`, if any.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError::read(key, e))?;

        Ok(value)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        debug!(key = %key, bytes = value.len(), "Writing record");

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::write(key, e))?;

        Ok(())
    }

    /// Deletes the record under `key`. Returns whether one existed.
    pub async fn remove(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::write(key, e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbError};

    async fn db() -> Database {
        Database::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let db = db().await;
        assert_eq!(db.kv().get("sync_stats").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let db = db().await;
        let kv = db.kv();

        kv.set("sync_stats", r#"{"totalOperations":1}"#).await.unwrap();
        assert_eq!(
            kv.get("sync_stats").await.unwrap().as_deref(),
            Some(r#"{"totalOperations":1}"#)
        );
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let db = db().await;
        let kv = db.kv();

        kv.set("sync_conflicts", "[]").await.unwrap();
        kv.set("sync_conflicts", "[{}]").await.unwrap();

        assert_eq!(kv.get("sync_conflicts").await.unwrap().as_deref(), Some("[{}]"));
    }

    #[tokio::test]
    async fn test_remove() {
        let db = db().await;
        let kv = db.kv();

        kv.set("offline_action_queue", "{}").await.unwrap();
        assert!(kv.remove("offline_action_queue").await.unwrap());
        assert!(!kv.remove("offline_action_queue").await.unwrap());
        assert!(kv.get("offline_action_queue").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockroom.db");

        let db = Database::open(&path).await.unwrap();
        db.kv().set("sync_operations", r#"{"pending":[]}"#).await.unwrap();
        db.close().await;

        let reopened = Database::open(&path).await.unwrap();
        assert_eq!(
            reopened.kv().get("sync_operations").await.unwrap().as_deref(),
            Some(r#"{"pending":[]}"#)
        );
    }

    #[tokio::test]
    async fn test_write_after_close_is_reported() {
        let db = db().await;
        db.close().await;

        let err = db.kv().set("sync_stats", "{}").await.unwrap_err();
        assert!(matches!(err, DbError::Closed));
    }
}
