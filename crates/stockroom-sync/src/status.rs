//! # Sync Status & Events
//!
//! The read-only snapshot handed to the host UI, and the event hooks the
//! engine fires as state changes.
//!
//! ## Events
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  emit_status    after every batch and every mutating entry point       │
//! │  emit_progress  after every batch: { pending, completed }              │
//! │  emit_error     on dispatch failures and storage faults                │
//! │  emit_conflict  when dispatch surfaces a new conflict                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use stockroom_core::{ActionQueueStats, EntitySyncStatus, SyncConflict, SyncOperation, SyncStats};

// =============================================================================
// Sync Status
// =============================================================================

/// Point-in-time view of the engine for badges and lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub auto_sync_enabled: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub next_sync_time: Option<DateTime<Utc>>,

    /// Pending operations in dispatch order.
    pub pending_operations: Vec<SyncOperation>,
    pub failed_operations: Vec<SyncOperation>,

    /// Unresolved conflicts only. Resolved ones stay stored until purged.
    pub conflicts: Vec<SyncConflict>,
    pub unresolved_conflicts: u64,

    pub stats: SyncStats,
    pub last_error: Option<String>,
    pub error_count: u64,

    pub entity_status: BTreeMap<String, EntitySyncStatus>,
    pub action_queue: ActionQueueStats,
}

impl SyncStatus {
    /// Count shown on the pending badge.
    pub fn pending_count(&self) -> usize {
        self.pending_operations.len()
    }

    /// Count shown on the failed badge.
    pub fn failed_count(&self) -> usize {
        self.failed_operations.len()
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives engine events (implemented by the host UI integration).
pub trait SyncEventEmitter: Send + Sync {
    fn emit_status(&self, status: &SyncStatus);

    fn emit_progress(&self, pending: u64, completed: u64);

    fn emit_error(&self, message: &str, retryable: bool);

    fn emit_conflict(&self, conflict: &SyncConflict);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _pending: u64, _completed: u64) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
    fn emit_conflict(&self, _conflict: &SyncConflict) {}
}
