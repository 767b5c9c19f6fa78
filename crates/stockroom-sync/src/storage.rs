//! # Durable Storage
//!
//! Key-value persistence for the engine's four records.
//!
//! ## Persisted Layout
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────────────┐
//! │ key                      │ value (JSON text)                            │
//! ├──────────────────────────┼──────────────────────────────────────────────┤
//! │ sync_operations          │ { pending[], failed[], completedIds[] }      │
//! │ sync_conflicts           │ SyncConflict[]                               │
//! │ sync_stats               │ SyncStats                                    │
//! │ offline_action_queue     │ { queue[], maxSize, retryAttempts }          │
//! └──────────────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! The engine owns these keys exclusively. No cross-process locking.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use stockroom_db::Database;

use crate::error::{SyncError, SyncResult};

/// Storage keys.
pub mod keys {
    pub const OPERATIONS: &str = "sync_operations";
    pub const CONFLICTS: &str = "sync_conflicts";
    pub const STATS: &str = "sync_stats";
    pub const ACTION_QUEUE: &str = "offline_action_queue";

    pub const ALL: [&str; 4] = [OPERATIONS, CONFLICTS, STATS, ACTION_QUEUE];
}

/// Async key-value storage consumed by the engine.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> SyncResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> SyncResult<()>;
    async fn remove(&self, key: &str) -> SyncResult<()>;
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.kv().get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        Ok(self.kv().set(key, value).await?)
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        self.kv().remove(key).await?;
        Ok(())
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-process store for tests and ephemeral sessions.
///
/// Can be switched into a failing mode to exercise storage-fault handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    failing: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }

    /// Raw value, bypassing the failure switch.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Raw write, bypassing the failure switch.
    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn check(&self) -> SyncResult<()> {
        if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(SyncError::StorageUnavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        self.check()?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        self.check()?;
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}
