//! # Operation Store
//!
//! Authoritative record of pending, failed and completed sync operations.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Operation Lifecycle                                │
//! │                                                                         │
//! │   add()                                                                 │
//! │     │                                                                   │
//! │     ▼                mark_completed()      ┌─────────────────────────┐  │
//! │  ┌─────────┐ ───────────────────────────►  │ completed ids (ring 50) │  │
//! │  │ pending │                               └─────────────────────────┘  │
//! │  └─────────┘ ◄──── retry_failed() ────┐                                 │
//! │     │  ▲                              │                                 │
//! │     │  └── mark_failed() (budget left)│                                 │
//! │     │                                 │                                 │
//! │     └── mark_failed() (exhausted) ──► ┌────────┐                        │
//! │                                       │ failed │ ── clear_failed() ──►  │
//! │                                       └────────┘                        │
//! │                                                                         │
//! │  INVARIANTS                                                            │
//! │  • an id lives in exactly one of {pending, failed}                     │
//! │  • pending_operations == pending.len()                                 │
//! │  • failed_operations  == failed.len()                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutating method updates the set and its counter in the same
//! synchronous call, so no caller can ever observe them out of step.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::scheduler::PriorityScheduler;
use crate::types::{OperationSpec, Payload, Priority, SyncOperation, SyncStats};
use crate::COMPLETED_HISTORY_LIMIT;

// =============================================================================
// Persisted Record
// =============================================================================

/// The persisted `sync_operations` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStoreRecord {
    #[serde(default)]
    pub pending: Vec<SyncOperation>,
    #[serde(default)]
    pub failed: Vec<SyncOperation>,
    #[serde(default)]
    pub completed_ids: Vec<String>,
}

// =============================================================================
// Counters & Outcomes
// =============================================================================

/// Operation counters that feed [`SyncStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounters {
    pub total_operations: u64,
    pub pending_operations: u64,
    pub completed_operations: u64,
    pub failed_operations: u64,
}

// =============================================================================
// Operation Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct OperationStore {
    /// Kept in dispatch order (priority rank, then sequence).
    pending: Vec<SyncOperation>,
    failed: Vec<SyncOperation>,
    completed_ids: VecDeque<String>,
    completed_capacity: usize,
    next_sequence: u64,
    counters: OperationCounters,
}

impl Default for OperationStore {
    fn default() -> Self {
        OperationStore::new(COMPLETED_HISTORY_LIMIT)
    }
}

impl OperationStore {
    /// Creates an empty store keeping at most `completed_capacity` ids.
    pub fn new(completed_capacity: usize) -> Self {
        OperationStore {
            pending: Vec::new(),
            failed: Vec::new(),
            completed_ids: VecDeque::new(),
            completed_capacity: completed_capacity.max(1),
            next_sequence: 1,
            counters: OperationCounters::default(),
        }
    }

    /// Rebuilds a store from its persisted record and the persisted stats.
    ///
    /// Duplicate ids are dropped (pending wins over failed) so the
    /// one-copy invariant holds even for hand-edited or corrupted state.
    /// Pending operations whose budget is already spent are moved to the
    /// failed set. Pending and failed counters are taken from the set sizes.
    pub fn from_record(
        record: OperationStoreRecord,
        stats: &SyncStats,
        completed_capacity: usize,
    ) -> Self {
        let mut store = OperationStore::new(completed_capacity);
        let mut seen = HashSet::new();

        store.pending = record
            .pending
            .into_iter()
            .filter(|op| seen.insert(op.id.clone()))
            .collect();
        store.failed = record
            .failed
            .into_iter()
            .filter(|op| seen.insert(op.id.clone()))
            .collect();

        let (exhausted, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut store.pending)
            .into_iter()
            .partition(|op| RetryPolicy::decide(op) == RetryDecision::GiveUp);
        store.pending = pending;
        store.failed.extend(exhausted);

        let skip = record
            .completed_ids
            .len()
            .saturating_sub(store.completed_capacity);
        store.completed_ids = record.completed_ids.into_iter().skip(skip).collect();

        store.next_sequence = store
            .pending
            .iter()
            .chain(store.failed.iter())
            .map(|op| op.sequence)
            .max()
            .unwrap_or(0)
            + 1;
        PriorityScheduler::sort(&mut store.pending);

        let live = (store.pending.len() + store.failed.len()) as u64;
        store.counters = OperationCounters {
            total_operations: stats.total_operations.max(live),
            pending_operations: store.pending.len() as u64,
            completed_operations: stats.completed_operations,
            failed_operations: store.failed.len() as u64,
        };

        store
    }

    /// Snapshot for persistence.
    pub fn to_record(&self) -> OperationStoreRecord {
        OperationStoreRecord {
            pending: self.pending.clone(),
            failed: self.failed.clone(),
            completed_ids: self.completed_ids.iter().cloned().collect(),
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Stamps and queues a new operation. Returns its id.
    pub fn add(&mut self, spec: OperationSpec, now: DateTime<Utc>) -> String {
        let max_retries = spec.max_retries_or_default();
        let operation = SyncOperation {
            id: Uuid::new_v4().to_string(),
            kind: spec.kind,
            entity_type: spec.entity_type,
            entity_id: spec.entity_id,
            payload: spec.payload,
            created_at: now,
            retry_count: 0,
            max_retries,
            priority: spec.priority,
            sequence: self.take_sequence(),
            last_error: None,
        };
        let id = operation.id.clone();

        self.pending.push(operation);
        PriorityScheduler::sort(&mut self.pending);

        self.counters.total_operations += 1;
        self.counters.pending_operations += 1;

        id
    }

    /// Terminal success: drop from pending, remember the id.
    pub fn mark_completed(&mut self, id: &str) -> CoreResult<()> {
        let index = self.pending_index(id)?;
        let operation = self.pending.remove(index);

        if self.completed_ids.len() >= self.completed_capacity {
            self.completed_ids.pop_front();
        }
        self.completed_ids.push_back(operation.id);

        self.counters.pending_operations -= 1;
        self.counters.completed_operations += 1;
        Ok(())
    }

    /// Records a failed attempt and returns the policy's verdict.
    ///
    /// Increments `retry_count`. On [`RetryDecision::GiveUp`] the operation
    /// moves to the failed set, otherwise it stays pending for a later batch.
    pub fn mark_failed(&mut self, id: &str, error: &str) -> CoreResult<RetryDecision> {
        let index = self.pending_index(id)?;
        let operation = &mut self.pending[index];
        operation.retry_count += 1;
        operation.last_error = Some(error.to_string());

        let decision = RetryPolicy::decide(operation);
        if decision == RetryDecision::GiveUp {
            self.demote(index);
        }
        Ok(decision)
    }

    /// Records a non-retryable failure: straight to the failed set.
    pub fn mark_failed_permanently(&mut self, id: &str, error: &str) -> CoreResult<()> {
        let index = self.pending_index(id)?;
        let operation = &mut self.pending[index];
        operation.retry_count += 1;
        operation.last_error = Some(error.to_string());
        self.demote(index);
        Ok(())
    }

    /// Manual retry: failed → pending tail with `retry_count = 0`.
    pub fn retry_failed(&mut self, id: &str) -> CoreResult<()> {
        let index = self
            .failed
            .iter()
            .position(|op| op.id == id)
            .ok_or_else(|| CoreError::OperationNotFound(id.to_string()))?;

        let mut operation = self.failed.remove(index);
        operation.retry_count = 0;
        operation.last_error = None;
        operation.sequence = self.take_sequence();

        self.pending.push(operation);
        PriorityScheduler::sort(&mut self.pending);

        self.counters.failed_operations -= 1;
        self.counters.pending_operations += 1;
        Ok(())
    }

    /// Retries every failed operation, oldest first. Returns how many moved.
    pub fn retry_all_failed(&mut self) -> usize {
        let ids: Vec<String> = self.failed.iter().map(|op| op.id.clone()).collect();
        ids.iter().filter(|id| self.retry_failed(id).is_ok()).count()
    }

    /// Empties the failed set. Pending is untouched.
    pub fn clear_failed(&mut self) -> usize {
        let cleared = self.failed.len();
        self.failed.clear();
        self.counters.failed_operations = 0;
        cleared
    }

    /// Discards an operation from pending or failed without completing it.
    ///
    /// Unknown ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<SyncOperation> {
        if let Some(index) = self.pending.iter().position(|op| op.id == id) {
            self.counters.pending_operations -= 1;
            return Some(self.pending.remove(index));
        }

        if let Some(index) = self.failed.iter().position(|op| op.id == id) {
            self.counters.failed_operations -= 1;
            return Some(self.failed.remove(index));
        }

        None
    }

    /// Changes priority and re-sorts the full pending set.
    pub fn update_priority(&mut self, id: &str, priority: Priority) -> CoreResult<()> {
        let operation = self
            .get_mut(id)
            .ok_or_else(|| CoreError::OperationNotFound(id.to_string()))?;
        operation.priority = priority;

        PriorityScheduler::sort(&mut self.pending);
        Ok(())
    }

    /// Substitutes an operation's payload (merge resolution).
    pub fn replace_payload(&mut self, id: &str, payload: Payload) -> CoreResult<()> {
        let operation = self
            .get_mut(id)
            .ok_or_else(|| CoreError::OperationNotFound(id.to_string()))?;
        operation.payload = payload;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Pending operations in dispatch order.
    pub fn pending(&self) -> &[SyncOperation] {
        &self.pending
    }

    pub fn failed(&self) -> &[SyncOperation] {
        &self.failed
    }

    /// Most recent completed ids, oldest first.
    pub fn completed_ids(&self) -> impl Iterator<Item = &str> {
        self.completed_ids.iter().map(String::as_str)
    }

    pub fn get(&self, id: &str) -> Option<&SyncOperation> {
        self.pending
            .iter()
            .chain(self.failed.iter())
            .find(|op| op.id == id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.iter().any(|op| op.id == id)
    }

    pub fn counters(&self) -> OperationCounters {
        self.counters
    }

    /// True when counters match the set sizes.
    pub fn is_consistent(&self) -> bool {
        self.counters.pending_operations == self.pending.len() as u64
            && self.counters.failed_operations == self.failed.len() as u64
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn pending_index(&self, id: &str) -> CoreResult<usize> {
        self.pending
            .iter()
            .position(|op| op.id == id)
            .ok_or_else(|| CoreError::OperationNotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut SyncOperation> {
        self.pending
            .iter_mut()
            .chain(self.failed.iter_mut())
            .find(|op| op.id == id)
    }

    fn demote(&mut self, pending_index: usize) {
        let operation = self.pending.remove(pending_index);
        self.failed.push(operation);
        self.counters.pending_operations -= 1;
        self.counters.failed_operations += 1;
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
