//! # Sync Engine
//!
//! The orchestrator. Owns the operation, conflict and action stores, decides
//! when batches run, dispatches them through the [`RemoteClient`], and
//! persists everything through the [`KeyValueStore`].
//!
//! ## Engine Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine Architecture                        │
//! │                                                                         │
//! │   host UI                    SyncRunner                network watch    │
//! │      │ queue_operation           │ run_batch()              │           │
//! │      │ resolve_conflict          │ (deadline passed)        │ set_online│
//! │      ▼                           ▼                          ▼           │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 Mutex<EngineState> (never held across .await)    │  │
//! │  │                                                                  │  │
//! │  │   OperationStore   ConflictStore   BoundedActionQueue   config   │  │
//! │  │   is_online / is_syncing / next_sync_time / entity_status        │  │
//! │  └──────────────┬───────────────────────────────┬───────────────────┘  │
//! │                 │ snapshot (under lock)         │ batch (cloned)        │
//! │                 ▼                               ▼                       │
//! │        ┌─────────────────┐             ┌─────────────────┐             │
//! │        │  KeyValueStore  │             │  RemoteClient   │             │
//! │        │  (4 JSON keys)  │             │  dispatch(op)   │             │
//! │        └─────────────────┘             └─────────────────┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling
//! ```text
//! queue_operation          next = now + debounce      (online && auto)
//! offline → online         next = now                 (pending nonempty && auto)
//! manual local / merge     next = now                 (online && auto)
//! batch finished           next = now + interval      (pending nonempty && online && auto)
//!                          or an earlier deadline requested mid-batch
//!                          next = None                otherwise
//! trigger_sync             next = now                 (always)
//! ```
//!
//! At most one batch is in flight: a `run_batch` call that finds
//! `is_syncing` set returns [`BatchOutcome::Skipped`] without side effects.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use stockroom_core::validation::{validate_action_draft, validate_operation_spec};
use stockroom_core::{
    BoundedActionQueue, ConflictResolution, ConflictSpec, ConflictStore, EntitySyncStatus,
    OfflineActionDraft, OperationSpec, OperationStore, OperationStoreRecord, Payload, Priority,
    PriorityScheduler, RetryDecision, RetryPolicy, SyncConflict, SyncOperation, SyncStats,
};

use crate::client::{DispatchResult, RemoteClient};
use crate::clock::{Clock, SystemClock};
use crate::config::{SyncConfig, SyncConfigUpdate};
use crate::error::{SyncError, SyncResult};
use crate::status::{NoOpEmitter, SyncEventEmitter, SyncStatus};
use crate::storage::{keys, KeyValueStore, MemoryStore};

// =============================================================================
// Batch Outcome
// =============================================================================

/// Why `run_batch` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another batch is still in flight.
    AlreadySyncing,
    Offline,
}

/// Per-batch tally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub dispatched: usize,
    /// Dispatched operations that had failed in an earlier batch.
    pub retries: usize,
    pub succeeded: usize,
    pub conflicts: usize,
    /// Failed attempts that stay pending for a later batch.
    pub retrying: usize,
    /// Operations moved to the failed set.
    pub failed: usize,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Skipped(SkipReason),
    Completed(BatchSummary),
}

impl BatchOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, BatchOutcome::Skipped(_))
    }

    pub fn summary(&self) -> Option<&BatchSummary> {
        match self {
            BatchOutcome::Completed(summary) => Some(summary),
            BatchOutcome::Skipped(_) => None,
        }
    }
}

/// Result of [`SyncEngine::promote_actions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Promotion {
    /// Ids of the operations created, in queue order.
    pub promoted: Vec<String>,
    /// Actions left in the queue, with the reason.
    pub held: Vec<(String, String)>,
}

// =============================================================================
// Engine State
// =============================================================================

/// Serialized records plus the version they were taken at.
struct Snapshot {
    version: u64,
    records: Vec<(&'static str, String)>,
}

/// Events produced while applying one dispatch result, fired after the
/// state lock is released.
#[derive(Default)]
struct OutcomeEvents {
    conflict: Option<SyncConflict>,
    error: Option<(String, bool)>,
}

impl OutcomeEvents {
    fn emit(self, emitter: &dyn SyncEventEmitter) {
        if let Some(conflict) = self.conflict {
            emitter.emit_conflict(&conflict);
        }
        if let Some((message, retryable)) = self.error {
            emitter.emit_error(&message, retryable);
        }
    }
}

struct EngineState {
    config: SyncConfig,
    operations: OperationStore,
    conflicts: ConflictStore,
    actions: BoundedActionQueue,
    entity_status: BTreeMap<String, EntitySyncStatus>,

    is_online: bool,
    is_syncing: bool,
    last_sync_time: Option<DateTime<Utc>>,
    next_sync_time: Option<DateTime<Utc>>,
    last_successful_sync: Option<DateTime<Utc>>,
    average_sync_time: f64,
    last_error: Option<String>,
    error_count: u64,

    /// Bumped on every snapshot; stale snapshots are never written.
    version: u64,
}

impl EngineState {
    fn new(config: SyncConfig, is_online: bool) -> Self {
        EngineState {
            operations: OperationStore::new(config.retention.completed_history),
            conflicts: ConflictStore::new(),
            actions: BoundedActionQueue::new(config.queue.max_size, config.queue.retry_attempts),
            entity_status: BTreeMap::new(),
            is_online,
            is_syncing: false,
            last_sync_time: None,
            next_sync_time: None,
            last_successful_sync: None,
            average_sync_time: 0.0,
            last_error: None,
            error_count: 0,
            version: 0,
            config,
        }
    }

    fn stats(&self) -> SyncStats {
        let counters = self.operations.counters();
        SyncStats {
            total_operations: counters.total_operations,
            pending_operations: counters.pending_operations,
            completed_operations: counters.completed_operations,
            failed_operations: counters.failed_operations,
            conflicts_resolved: self.conflicts.resolved_count(),
            last_successful_sync: self.last_successful_sync,
            average_sync_time: self.average_sync_time,
        }
    }

    fn status(&self) -> SyncStatus {
        SyncStatus {
            is_online: self.is_online,
            is_syncing: self.is_syncing,
            auto_sync_enabled: self.config.sync.auto_sync_enabled,
            last_sync_time: self.last_sync_time,
            next_sync_time: self.next_sync_time,
            pending_operations: self.operations.pending().to_vec(),
            failed_operations: self.operations.failed().to_vec(),
            conflicts: self.conflicts.unresolved().cloned().collect(),
            unresolved_conflicts: self.conflicts.unresolved_count(),
            stats: self.stats(),
            last_error: self.last_error.clone(),
            error_count: self.error_count,
            entity_status: self.entity_status.clone(),
            action_queue: self.actions.stats(),
        }
    }

    fn entity(&mut self, entity_type: &str) -> &mut EntitySyncStatus {
        self.entity_status
            .entry(entity_type.to_string())
            .or_default()
    }

    fn record_fault(&mut self, message: String) {
        self.last_error = Some(message);
        self.error_count += 1;
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    fn can_auto_sync(&self) -> bool {
        self.is_online && self.config.sync.auto_sync_enabled
    }

    fn schedule_debounced(&mut self, now: DateTime<Utc>) {
        if self.can_auto_sync() {
            let next = later(now, self.config.debounce());
            debug!(next_sync_time = %next, "Scheduled debounced sync");
            self.next_sync_time = Some(next);
        }
    }

    fn schedule_immediate(&mut self, now: DateTime<Utc>) {
        if self.can_auto_sync() {
            self.next_sync_time = Some(now);
        }
    }

    /// Retries wait one interval. A deadline requested while the batch was
    /// in flight (new work, manual trigger, manual resolution) is kept if
    /// it is earlier.
    fn schedule_after_batch(&mut self, now: DateTime<Utc>) {
        if !self.can_auto_sync() || self.operations.pending().is_empty() {
            self.next_sync_time = None;
            return;
        }

        let tick = later(now, self.config.sync_interval());
        self.next_sync_time = Some(match self.next_sync_time {
            Some(requested) if requested < tick => requested,
            _ => tick,
        });
    }

    // -------------------------------------------------------------------------
    // Conflicts
    // -------------------------------------------------------------------------

    fn purge_conflicts(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now
            .checked_sub_signed(self.config.conflict_retention())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let purged = self.conflicts.purge_resolved_before(cutoff);
        if purged > 0 {
            debug!(purged, "Purged resolved conflicts");
        }
        purged
    }

    /// Applies a recorded decision to the operation behind the conflict.
    /// Returns true when the operation stays queued for another attempt.
    fn apply_resolution(
        &mut self,
        operation_id: &str,
        resolution: ConflictResolution,
        merged: Option<Payload>,
    ) -> bool {
        if resolution.discards_operation() {
            if self.operations.remove(operation_id).is_some() {
                info!(operation_id, %resolution, "Discarded operation after conflict resolution");
            }
            return false;
        }

        if let Some(payload) = merged {
            if let Err(e) = self.operations.replace_payload(operation_id, payload) {
                warn!(operation_id, error = %e, "Merged payload not applied");
            }
        }
        true
    }

    // -------------------------------------------------------------------------
    // Dispatch results
    // -------------------------------------------------------------------------

    fn apply_outcome(
        &mut self,
        operation: &SyncOperation,
        result: DispatchResult,
        now: DateTime<Utc>,
        summary: &mut BatchSummary,
    ) -> OutcomeEvents {
        let mut events = OutcomeEvents::default();
        let id = operation.id.as_str();

        match result {
            DispatchResult::Success => {
                if self.operations.mark_completed(id).is_err() {
                    debug!(id, "Operation removed while in flight");
                    return events;
                }
                summary.succeeded += 1;
                let entity = self.entity(&operation.entity_type);
                entity.last_sync = Some(now);
                entity.error = None;
                debug!(id, entity_type = %operation.entity_type, "Operation synced");
            }

            DispatchResult::Conflict {
                kind,
                local_data,
                remote_data,
            } => {
                summary.conflicts += 1;
                let conflict_id = self.conflicts.record(
                    ConflictSpec {
                        operation_id: operation.id.clone(),
                        kind,
                        local_data,
                        remote_data,
                    },
                    now,
                );
                self.entity(&operation.entity_type).error = Some(format!("conflict: {kind}"));
                warn!(id, conflict_id = %conflict_id, %kind, "Conflict detected");
                events.conflict = self.conflicts.get(&conflict_id).cloned();

                // Auto-resolved operations go out with the next regular tick,
                // so a server that keeps reporting conflicts is not hammered.
                if let Some(resolution) = self.config.sync.conflict_policy.auto_resolution() {
                    if self.conflicts.resolve(&conflict_id, resolution, now).is_ok() {
                        info!(conflict_id = %conflict_id, %resolution, "Conflict auto-resolved");
                        self.apply_resolution(id, resolution, None);
                    }
                }
            }

            DispatchResult::Failure {
                retryable: true,
                message,
            } => {
                self.entity(&operation.entity_type).error = Some(message.clone());
                let retry_count = operation.retry_count + 1;
                match self.operations.mark_failed(id, &message) {
                    Ok(RetryDecision::GiveUp) => {
                        summary.failed += 1;
                        warn!(id, retry_count, error = %message, "Retry budget exhausted");
                        self.record_fault(message.clone());
                    }
                    // a counted failure never yields RetryNow
                    Ok(RetryDecision::RetryLater | RetryDecision::RetryNow) => {
                        summary.retrying += 1;
                        debug!(id, retry_count, error = %message, "Dispatch failed, retrying next tick");
                    }
                    Err(_) => debug!(id, "Operation removed while in flight"),
                }
                events.error = Some((message, true));
            }

            DispatchResult::Failure {
                retryable: false,
                message,
            } => {
                self.entity(&operation.entity_type).error = Some(message.clone());
                if self.operations.mark_failed_permanently(id, &message).is_ok() {
                    summary.failed += 1;
                    warn!(id, error = %message, "Dispatch rejected permanently");
                    self.record_fault(message.clone());
                }
                events.error = Some((message, false));
            }
        }

        events
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    fn snapshot(&mut self) -> Snapshot {
        self.version += 1;

        let encoded = [
            (keys::OPERATIONS, serde_json::to_string(&self.operations.to_record())),
            (keys::CONFLICTS, serde_json::to_string(self.conflicts.all())),
            (keys::STATS, serde_json::to_string(&self.stats())),
            (keys::ACTION_QUEUE, serde_json::to_string(&self.actions)),
        ];

        let mut records = Vec::with_capacity(encoded.len());
        for (key, result) in encoded {
            match result {
                Ok(json) => records.push((key, json)),
                Err(e) => {
                    error!(key, error = %e, "Failed to encode sync record");
                    self.record_fault(SyncError::from(e).to_string());
                }
            }
        }

        Snapshot {
            version: self.version,
            records,
        }
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Offline-first sync orchestrator.
///
/// Share it as `Arc<SyncEngine>` between the host UI and a
/// [`SyncRunner`](crate::runner::SyncRunner).
pub struct SyncEngine {
    state: Mutex<EngineState>,
    store: Arc<dyn KeyValueStore>,
    client: Arc<dyn RemoteClient>,
    clock: Arc<dyn Clock>,
    emitter: Arc<dyn SyncEventEmitter>,

    /// Wakes the runner when scheduling state changes.
    wake: Notify,

    /// Version of the last snapshot written. Serializes writers.
    persisted: tokio::sync::Mutex<u64>,
}

impl SyncEngine {
    pub fn builder(config: SyncConfig) -> SyncEngineBuilder {
        SyncEngineBuilder::new(config)
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Loads persisted state. Call once, before the engine is shared.
    ///
    /// Missing keys start empty. Malformed records and read failures are
    /// logged and counted as faults, and the affected component starts
    /// empty. After a read failure nothing is written back, so a flaky
    /// store cannot be overwritten with empty state.
    pub async fn restore(&self) {
        let mut raw: HashMap<&'static str, String> = HashMap::new();
        let mut faults = Vec::new();
        let mut read_failed = false;

        for key in keys::ALL {
            match self.store.get(key).await {
                Ok(Some(value)) => {
                    raw.insert(key, value);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key, error = %e, "Failed to read sync record");
                    faults.push(e.to_string());
                    read_failed = true;
                }
            }
        }

        let now = self.clock.now();
        let snapshot = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let config = state.config.clone();

            let stats: SyncStats = decode(&raw, keys::STATS, &mut faults).unwrap_or_default();
            let record: OperationStoreRecord =
                decode(&raw, keys::OPERATIONS, &mut faults).unwrap_or_default();
            let conflicts: Vec<SyncConflict> =
                decode(&raw, keys::CONFLICTS, &mut faults).unwrap_or_default();
            let mut actions: BoundedActionQueue = decode(&raw, keys::ACTION_QUEUE, &mut faults)
                .unwrap_or_else(|| {
                    BoundedActionQueue::new(config.queue.max_size, config.queue.retry_attempts)
                });

            let evicted = actions.resize(config.queue.max_size);
            if !evicted.is_empty() {
                warn!(
                    evicted = evicted.len(),
                    max_size = config.queue.max_size,
                    "Offline actions dropped to fit queue capacity"
                );
            }
            actions.set_retry_attempts(config.queue.retry_attempts);

            state.operations =
                OperationStore::from_record(record, &stats, config.retention.completed_history);
            state.conflicts = ConflictStore::from_conflicts(conflicts, stats.conflicts_resolved);
            state.actions = actions;
            state.last_successful_sync = stats.last_successful_sync;
            state.average_sync_time = stats.average_sync_time;

            for fault in faults {
                state.record_fault(fault);
            }

            state.purge_conflicts(now);
            if !state.operations.pending().is_empty() {
                state.schedule_immediate(now);
            }

            info!(
                pending = state.operations.pending().len(),
                failed = state.operations.failed().len(),
                unresolved_conflicts = state.conflicts.unresolved_count(),
                queued_actions = state.actions.len(),
                "Restored sync state"
            );

            (!read_failed).then(|| state.snapshot())
        };

        match snapshot {
            Some(snapshot) => self.commit(snapshot).await,
            None => self.notify(),
        }
    }

    /// Writes every record to the store.
    ///
    /// Every mutating entry point already calls this; it is public for hosts
    /// that want to flush before shutdown.
    pub async fn persist(&self) {
        let snapshot = self.lock().snapshot();
        self.write(snapshot).await;
    }

    async fn write(&self, snapshot: Snapshot) {
        let mut persisted = self.persisted.lock().await;
        if snapshot.version <= *persisted {
            debug!(version = snapshot.version, "Skipping stale snapshot");
            return;
        }

        let mut failure = None;
        for (key, json) in &snapshot.records {
            if let Err(e) = self.store.set(key, json).await {
                error!(key = %key, error = %e, "Failed to persist sync record");
                failure = Some(e);
            }
        }
        *persisted = snapshot.version;
        drop(persisted);

        if let Some(e) = failure {
            let message = e.to_string();
            self.lock().record_fault(message.clone());
            self.emitter.emit_error(&message, e.is_retryable());
        }
    }

    /// Persist, publish status, wake the runner.
    async fn commit(&self, snapshot: Snapshot) {
        self.write(snapshot).await;
        self.emitter.emit_status(&self.status());
        self.notify();
    }

    fn notify(&self) {
        self.wake.notify_one();
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Validates and queues an operation. Returns its id.
    ///
    /// Operations without an explicit budget get the configured
    /// `max_retries`. When online with auto-sync on, a sync is scheduled
    /// one debounce interval out.
    pub async fn queue_operation(&self, mut spec: OperationSpec) -> SyncResult<String> {
        validate_operation_spec(&spec)?;

        let now = self.clock.now();
        let (id, snapshot) = {
            let mut state = self.lock();
            if spec.max_retries.is_none() {
                spec.max_retries = Some(state.config.sync.max_retries);
            }
            let entity_type = spec.entity_type.clone();
            let kind = spec.kind;

            let id = state.operations.add(spec, now);
            state.entity(&entity_type);
            state.schedule_debounced(now);

            debug!(id = %id, entity_type = %entity_type, %kind, "Queued operation");
            (id, state.snapshot())
        };

        self.commit(snapshot).await;
        Ok(id)
    }

    /// Discards a pending operation. Unknown ids are a no-op.
    pub async fn remove_operation(&self, id: &str) -> bool {
        let (removed, snapshot) = {
            let mut state = self.lock();
            let removed = state.operations.remove(id).is_some();
            if removed {
                debug!(id, "Removed pending operation");
            }
            (removed, state.snapshot())
        };

        self.commit(snapshot).await;
        removed
    }

    pub async fn update_operation_priority(&self, id: &str, priority: Priority) -> SyncResult<()> {
        let snapshot = {
            let mut state = self.lock();
            state.operations.update_priority(id, priority)?;
            state.snapshot()
        };

        self.commit(snapshot).await;
        Ok(())
    }

    /// Moves one failed operation back to pending with a fresh budget.
    pub async fn retry_failed_operation(&self, id: &str) -> SyncResult<()> {
        let now = self.clock.now();
        let snapshot = {
            let mut state = self.lock();
            state.operations.retry_failed(id)?;
            state.schedule_debounced(now);
            info!(id, "Retrying failed operation");
            state.snapshot()
        };

        self.commit(snapshot).await;
        Ok(())
    }

    /// Moves every failed operation back to pending. Returns how many moved.
    pub async fn retry_all_failed(&self) -> usize {
        let now = self.clock.now();
        let (moved, snapshot) = {
            let mut state = self.lock();
            let moved = state.operations.retry_all_failed();
            if moved > 0 {
                state.schedule_debounced(now);
                info!(moved, "Retrying all failed operations");
            }
            (moved, state.snapshot())
        };

        self.commit(snapshot).await;
        moved
    }

    /// Drops every failed operation. Returns how many were dropped.
    pub async fn clear_failed(&self) -> usize {
        let (cleared, snapshot) = {
            let mut state = self.lock();
            let cleared = state.operations.clear_failed();
            (cleared, state.snapshot())
        };

        self.commit(snapshot).await;
        cleared
    }

    // =========================================================================
    // Connectivity & Scheduling
    // =========================================================================

    /// Applies a reachability change.
    ///
    /// Offline → online with pending work schedules an immediate sync.
    /// Online → offline only flips the flag; an in-flight batch finishes on
    /// its own.
    pub fn set_online(&self, online: bool) {
        let now = self.clock.now();
        let status = {
            let mut state = self.lock();
            if state.is_online == online {
                return;
            }
            state.is_online = online;

            if online {
                let pending = state.operations.pending().len();
                if pending > 0 {
                    state.schedule_immediate(now);
                }
                info!(pending, "Network reachable");
            } else {
                info!("Network unreachable");
            }
            state.status()
        };

        self.emitter.emit_status(&status);
        self.notify();
    }

    /// Requests a batch as soon as the runner wakes, regardless of auto-sync.
    pub fn trigger_sync(&self) {
        let now = self.clock.now();
        self.lock().next_sync_time = Some(now);
        debug!("Manual sync requested");
        self.notify();
    }

    /// Applies a runtime configuration change.
    ///
    /// Disabling auto-sync cancels the scheduled batch. Enabling it while
    /// online with pending work schedules one immediately.
    pub fn update_sync_config(&self, update: SyncConfigUpdate) -> SyncResult<()> {
        let now = self.clock.now();
        let status = {
            let mut state = self.lock();
            let was_enabled = state.config.sync.auto_sync_enabled;
            state.config.apply_update(&update)?;
            let enabled = state.config.sync.auto_sync_enabled;

            if was_enabled && !enabled {
                state.next_sync_time = None;
                info!("Auto-sync disabled");
            } else if !was_enabled && enabled {
                if !state.operations.pending().is_empty() {
                    state.schedule_immediate(now);
                }
                info!("Auto-sync enabled");
            }
            state.status()
        };

        self.emitter.emit_status(&status);
        self.notify();
        Ok(())
    }

    pub fn set_auto_sync(&self, enabled: bool) -> SyncResult<()> {
        self.update_sync_config(SyncConfigUpdate {
            auto_sync_enabled: Some(enabled),
            ..Default::default()
        })
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Dispatches one batch.
    ///
    /// Operations blocked on an unresolved conflict are never selected.
    /// Outcomes are routed one at a time as they arrive; the state lock is
    /// released around every dispatch.
    pub async fn run_batch(&self) -> BatchOutcome {
        let (batch, started, completed_before) = {
            let mut guard = self.lock();
            let state = &mut *guard;

            if state.is_syncing {
                debug!("Batch already in flight, skipping");
                return BatchOutcome::Skipped(SkipReason::AlreadySyncing);
            }
            if !state.is_online {
                debug!("Offline, skipping batch");
                return BatchOutcome::Skipped(SkipReason::Offline);
            }

            state.is_syncing = true;
            state.last_error = None;
            state.next_sync_time = None;

            let conflicts = &state.conflicts;
            let batch: Vec<SyncOperation> = PriorityScheduler::select_batch_where(
                state.operations.pending(),
                state.config.sync.batch_size,
                |op| {
                    RetryPolicy::decide(op) != RetryDecision::GiveUp
                        && !conflicts.has_unresolved_for(&op.id)
                },
            )
            .into_iter()
            .cloned()
            .collect();

            for operation in &batch {
                state.entity(&operation.entity_type).is_loading = true;
            }

            (
                batch,
                self.clock.now(),
                state.operations.counters().completed_operations,
            )
        };

        let retries = batch
            .iter()
            .filter(|op| RetryPolicy::decide(op) == RetryDecision::RetryLater)
            .count();
        if !batch.is_empty() {
            info!(count = batch.len(), retries, "Starting sync batch");
        }

        let mut summary = BatchSummary {
            dispatched: batch.len(),
            retries,
            ..Default::default()
        };

        for operation in &batch {
            let result = self.client.dispatch(operation).await;
            let now = self.clock.now();
            let events = {
                let mut state = self.lock();
                state.apply_outcome(operation, result, now, &mut summary)
            };
            events.emit(self.emitter.as_ref());
        }

        let finished = self.clock.now();
        let (snapshot, pending, completed) = {
            let mut guard = self.lock();
            let state = &mut *guard;

            for operation in &batch {
                state.entity(&operation.entity_type).is_loading = false;
            }

            summary.duration_ms = (finished - started).num_milliseconds().max(0) as f64;
            if summary.succeeded > 0 {
                let n = (completed_before + 1) as f64;
                state.average_sync_time =
                    (state.average_sync_time * (n - 1.0) + summary.duration_ms) / n;
                state.last_successful_sync = Some(finished);
            }

            state.is_syncing = false;
            state.last_sync_time = Some(finished);
            state.purge_conflicts(finished);
            state.schedule_after_batch(finished);

            let counters = state.operations.counters();
            if summary.dispatched > 0 {
                info!(
                    succeeded = summary.succeeded,
                    conflicts = summary.conflicts,
                    retrying = summary.retrying,
                    failed = summary.failed,
                    duration_ms = summary.duration_ms,
                    pending = counters.pending_operations,
                    "Sync batch finished"
                );
            }

            (
                state.snapshot(),
                counters.pending_operations,
                counters.completed_operations,
            )
        };

        self.write(snapshot).await;
        self.emitter.emit_progress(pending, completed);
        self.emitter.emit_status(&self.status());
        self.notify();

        BatchOutcome::Completed(summary)
    }

    // =========================================================================
    // Conflicts
    // =========================================================================

    /// Records a decision on a conflict and applies it.
    ///
    /// ```text
    /// local   keep the queued payload; operation unblocked
    /// merge   replace the payload with `merged`; operation unblocked
    /// remote  discard the operation
    /// skip    discard the operation
    /// ```
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        resolution: ConflictResolution,
        merged: Option<Payload>,
    ) -> SyncResult<()> {
        let now = self.clock.now();
        let snapshot = {
            let mut state = self.lock();

            let conflict = state
                .conflicts
                .get(conflict_id)
                .ok_or_else(|| SyncError::ConflictNotFound(conflict_id.to_string()))?;
            if let Some(existing) = conflict.resolution {
                return Err(SyncError::ConflictAlreadyResolved {
                    id: conflict_id.to_string(),
                    resolution: existing.to_string(),
                });
            }
            if resolution == ConflictResolution::Merge && merged.is_none() {
                return Err(SyncError::MergePayloadRequired(conflict_id.to_string()));
            }

            let resolved = state.conflicts.resolve(conflict_id, resolution, now)?;
            if state.apply_resolution(&resolved.operation_id, resolution, merged) {
                state.schedule_immediate(now);
            }
            info!(conflict_id, %resolution, operation_id = %resolved.operation_id, "Conflict resolved");

            state.snapshot()
        };

        self.commit(snapshot).await;
        Ok(())
    }

    /// Drops resolved conflicts past the retention window. Returns how many.
    pub async fn purge_resolved_conflicts(&self) -> usize {
        let now = self.clock.now();
        let (purged, snapshot) = {
            let mut state = self.lock();
            let purged = state.purge_conflicts(now);
            (purged, state.snapshot())
        };

        self.commit(snapshot).await;
        purged
    }

    // =========================================================================
    // Offline Actions
    // =========================================================================

    /// Captures a raw offline action. Returns its id.
    pub async fn capture_action(&self, draft: OfflineActionDraft) -> SyncResult<String> {
        validate_action_draft(&draft)?;

        let now = self.clock.now();
        let (id, snapshot) = {
            let mut state = self.lock();
            let enqueued = state.actions.enqueue(draft, now);
            if let Some(evicted) = &enqueued.evicted {
                warn!(
                    evicted_id = %evicted.id,
                    max_size = state.actions.max_size(),
                    "Offline action queue full, evicted oldest action"
                );
            }
            debug!(id = %enqueued.id, "Captured offline action");
            (enqueued.id, state.snapshot())
        };

        self.commit(snapshot).await;
        Ok(id)
    }

    /// Converts queued mutating actions into sync operations.
    ///
    /// Actions are taken in queue order after first attempts are moved ahead
    /// of retries. Promoted and GET actions leave the queue. A mutating
    /// action with no derivable entity id, or whose derived operation fails
    /// validation, stays queued and is listed in [`Promotion::held`].
    pub async fn promote_actions(&self) -> Promotion {
        let now = self.clock.now();
        let (promoted, snapshot) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.actions.reorder();

            let mut drained = Vec::new();
            let mut specs = Vec::new();
            let mut held = Vec::new();
            for action in state.actions.iter() {
                if action.method.operation_kind().is_none() {
                    drained.push(action.id.clone());
                    continue;
                }
                let Some(spec) = action.to_operation_spec() else {
                    warn!(id = %action.id, endpoint = %action.endpoint, "Offline action has no entity id");
                    held.push((action.id.clone(), "no entity id in payload or endpoint".to_string()));
                    continue;
                };
                if let Err(e) = validate_operation_spec(&spec) {
                    warn!(id = %action.id, error = %e, "Offline action not promotable");
                    held.push((action.id.clone(), e.to_string()));
                    continue;
                }
                drained.push(action.id.clone());
                specs.push(spec);
            }
            state.actions.remove_many(drained.as_slice());

            let mut promoted = Vec::with_capacity(specs.len());
            for spec in specs {
                let entity_type = spec.entity_type.clone();
                promoted.push(state.operations.add(spec, now));
                state.entity(&entity_type);
            }
            if !promoted.is_empty() {
                state.schedule_debounced(now);
                info!(promoted = promoted.len(), held = held.len(), "Promoted offline actions");
            }

            (Promotion { promoted, held }, state.snapshot())
        };

        self.commit(snapshot).await;
        promoted
    }

    /// Bumps a captured action's retry count. Returns the new count.
    pub async fn record_action_attempt(&self, id: &str) -> SyncResult<u32> {
        let (attempts, snapshot) = {
            let mut state = self.lock();
            let attempts = state
                .actions
                .record_attempt(id)
                .ok_or_else(|| SyncError::ActionNotFound(id.to_string()))?;
            (attempts, state.snapshot())
        };

        self.commit(snapshot).await;
        Ok(attempts)
    }

    /// Drops a captured action. Unknown ids are a no-op.
    pub async fn remove_action(&self, id: &str) -> bool {
        let (removed, snapshot) = {
            let mut state = self.lock();
            let removed = state.actions.remove(id);
            (removed, state.snapshot())
        };

        self.commit(snapshot).await;
        removed
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn status(&self) -> SyncStatus {
        self.lock().status()
    }

    pub fn stats(&self) -> SyncStats {
        self.lock().stats()
    }

    pub fn config(&self) -> SyncConfig {
        self.lock().config.clone()
    }

    pub fn is_online(&self) -> bool {
        self.lock().is_online
    }

    pub fn is_syncing(&self) -> bool {
        self.lock().is_syncing
    }

    pub fn next_sync_time(&self) -> Option<DateTime<Utc>> {
        self.lock().next_sync_time
    }

    pub fn pending_operations(&self) -> Vec<SyncOperation> {
        self.lock().operations.pending().to_vec()
    }

    pub fn failed_operations(&self) -> Vec<SyncOperation> {
        self.lock().operations.failed().to_vec()
    }

    /// Unresolved conflicts only.
    pub fn conflicts(&self) -> Vec<SyncConflict> {
        self.lock().conflicts.unresolved().cloned().collect()
    }

    /// Every stored conflict, resolved ones included until purged.
    pub fn all_conflicts(&self) -> Vec<SyncConflict> {
        self.lock().conflicts.all().to_vec()
    }

    pub fn entity_status(&self, entity_type: &str) -> Option<EntitySyncStatus> {
        self.lock().entity_status.get(entity_type).cloned()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resolves when scheduling state may have changed.
    pub async fn changed(&self) {
        self.wake.notified().await;
    }
}

/// `now + delay`, saturating at the far future.
fn later(now: DateTime<Utc>, delay: chrono::Duration) -> DateTime<Utc> {
    now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Decodes one persisted record, logging and collecting malformed ones.
fn decode<T: DeserializeOwned>(
    raw: &HashMap<&'static str, String>,
    key: &'static str,
    faults: &mut Vec<String>,
) -> Option<T> {
    let json = raw.get(key)?;
    match serde_json::from_str(json) {
        Ok(value) => Some(value),
        Err(e) => {
            let err = SyncError::DeserializationFailed {
                key: key.to_string(),
                reason: e.to_string(),
            };
            warn!(key, error = %e, "Malformed sync record, starting empty");
            faults.push(err.to_string());
            None
        }
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a SyncEngine with options.
pub struct SyncEngineBuilder {
    config: SyncConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    client: Option<Arc<dyn RemoteClient>>,
    clock: Option<Arc<dyn Clock>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
    online: bool,
}

impl SyncEngineBuilder {
    pub fn new(config: SyncConfig) -> Self {
        SyncEngineBuilder {
            config,
            store: None,
            client: None,
            clock: None,
            emitter: None,
            online: false,
        }
    }

    /// Sets the durable store. Defaults to an in-memory store.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_client(mut self, client: Arc<dyn RemoteClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Initial reachability. Defaults to offline.
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn build(self) -> SyncResult<SyncEngine> {
        self.config.validate()?;

        let client = self
            .client
            .ok_or_else(|| SyncError::InvalidConfig("Remote client required".into()))?;

        let store = self.store.unwrap_or_else(|| {
            warn!("No durable store configured, sync state will not survive restarts");
            Arc::new(MemoryStore::new())
        });

        Ok(SyncEngine {
            state: Mutex::new(EngineState::new(self.config, self.online)),
            store,
            client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            emitter: self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter)),
            wake: Notify::new(),
            persisted: tokio::sync::Mutex::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ConflictPolicy;
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stockroom_core::{ConflictKind, HttpMethod, OperationKind};

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    /// Replays scripted results per entity id; unscripted dispatches succeed.
    #[derive(Default)]
    struct ScriptedClient {
        script: Mutex<HashMap<String, VecDeque<DispatchResult>>>,
        calls: Mutex<Vec<SyncOperation>>,
    }

    impl ScriptedClient {
        fn push(&self, entity_id: &str, result: DispatchResult) {
            self.script
                .lock()
                .unwrap()
                .entry(entity_id.to_string())
                .or_default()
                .push_back(result);
        }

        fn dispatched_ids(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|op| op.entity_id.clone())
                .collect()
        }

        fn last_payload(&self) -> Option<Payload> {
            self.calls.lock().unwrap().last().map(|op| op.payload.clone())
        }
    }

    #[async_trait]
    impl RemoteClient for ScriptedClient {
        async fn dispatch(&self, operation: &SyncOperation) -> DispatchResult {
            self.calls.lock().unwrap().push(operation.clone());
            self.script
                .lock()
                .unwrap()
                .get_mut(&operation.entity_id)
                .and_then(VecDeque::pop_front)
                .unwrap_or(DispatchResult::Success)
        }
    }

    /// Holds every dispatch until the gate is opened.
    #[derive(Default)]
    struct GatedClient {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteClient for GatedClient {
        async fn dispatch(&self, _operation: &SyncOperation) -> DispatchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            DispatchResult::Success
        }
    }

    /// Advances the clock on every dispatch.
    struct SlowClient {
        clock: Arc<ManualClock>,
        step: Duration,
    }

    #[async_trait]
    impl RemoteClient for SlowClient {
        async fn dispatch(&self, _operation: &SyncOperation) -> DispatchResult {
            self.clock.advance(self.step);
            DispatchResult::Success
        }
    }

    #[derive(Default)]
    struct RecordingEmitter {
        events: Mutex<Vec<String>>,
    }

    impl RecordingEmitter {
        fn count(&self, prefix: &str) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.starts_with(prefix))
                .count()
        }
    }

    impl SyncEventEmitter for RecordingEmitter {
        fn emit_status(&self, _status: &SyncStatus) {
            self.events.lock().unwrap().push("status".into());
        }
        fn emit_progress(&self, pending: u64, completed: u64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress:{pending}:{completed}"));
        }
        fn emit_error(&self, message: &str, retryable: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error:{retryable}:{message}"));
        }
        fn emit_conflict(&self, conflict: &SyncConflict) {
            self.events
                .lock()
                .unwrap()
                .push(format!("conflict:{}", conflict.kind));
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    struct Harness {
        engine: SyncEngine,
        client: Arc<ScriptedClient>,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
    }

    fn harness_with(config: SyncConfig, online: bool) -> Harness {
        let client = Arc::new(ScriptedClient::default());
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::builder(config)
            .with_client(client.clone())
            .with_clock(clock.clone())
            .with_store(store.clone())
            .online(online)
            .build()
            .unwrap();
        Harness {
            engine,
            client,
            clock,
            store,
        }
    }

    fn harness(online: bool) -> Harness {
        harness_with(SyncConfig::default(), online)
    }

    fn spec(entity_id: &str) -> OperationSpec {
        OperationSpec::new(
            OperationKind::Update,
            "product",
            entity_id,
            json!({ "id": entity_id, "qty": 1 }),
        )
    }

    fn draft(method: HttpMethod, endpoint: &str) -> OfflineActionDraft {
        OfflineActionDraft {
            action_type: "inventory".to_string(),
            endpoint: endpoint.to_string(),
            method,
            payload: Payload::new(json!({ "qty": 4 })),
            tenant_id: "t-1".to_string(),
            user_id: "u-1".to_string(),
            max_retries: None,
        }
    }

    fn conflict(kind: ConflictKind) -> DispatchResult {
        DispatchResult::Conflict {
            kind,
            local_data: Payload::new(json!({ "qty": 1 })),
            remote_data: Payload::new(json!({ "qty": 9 })),
        }
    }

    // -------------------------------------------------------------------------
    // Builder
    // -------------------------------------------------------------------------

    #[test]
    fn test_builder_requires_client() {
        let result = SyncEngine::builder(SyncConfig::default()).build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = SyncConfig::default();
        config.sync.batch_size = 0;
        let result = SyncEngine::builder(config)
            .with_client(Arc::new(ScriptedClient::default()))
            .build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_queue_operation_schedules_debounced_sync() {
        let h = harness(true);
        let now = h.clock.now();

        h.engine.queue_operation(spec("p-1")).await.unwrap();

        assert_eq!(h.engine.next_sync_time(), Some(now + Duration::milliseconds(1000)));
        assert_eq!(h.engine.pending_operations()[0].max_retries, 3);
    }

    #[tokio::test]
    async fn test_queue_operation_offline_does_not_schedule() {
        let h = harness(false);
        h.engine.queue_operation(spec("p-1")).await.unwrap();

        assert_eq!(h.engine.next_sync_time(), None);
        assert_eq!(h.engine.status().pending_count(), 1);
    }

    #[tokio::test]
    async fn test_queue_operation_rejects_invalid_spec() {
        let h = harness(true);
        let err = h.engine.queue_operation(spec("")).await.unwrap_err();

        assert!(matches!(err, SyncError::Validation(_)));
        assert!(h.engine.pending_operations().is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_schedules_immediate_sync() {
        let h = harness(false);
        for i in 0..5 {
            h.engine.queue_operation(spec(&format!("p-{i}"))).await.unwrap();
        }
        h.clock.advance(Duration::seconds(42));

        h.engine.set_online(true);

        assert_eq!(h.engine.next_sync_time(), Some(h.clock.now()));
    }

    #[tokio::test]
    async fn test_reconnect_without_pending_does_not_schedule() {
        let h = harness(false);
        h.engine.set_online(true);
        assert!(h.engine.is_online());
        assert_eq!(h.engine.next_sync_time(), None);
    }

    #[tokio::test]
    async fn test_going_offline_only_flips_flag() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        let scheduled = h.engine.next_sync_time();

        h.engine.set_online(false);

        assert!(!h.engine.is_online());
        assert_eq!(h.engine.next_sync_time(), scheduled);
        assert_eq!(h.engine.pending_operations().len(), 1);
    }

    #[tokio::test]
    async fn test_disabling_auto_sync_cancels_schedule() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();

        h.engine.set_auto_sync(false).unwrap();
        assert_eq!(h.engine.next_sync_time(), None);

        h.engine.queue_operation(spec("p-2")).await.unwrap();
        assert_eq!(h.engine.next_sync_time(), None);

        h.engine.set_auto_sync(true).unwrap();
        assert_eq!(h.engine.next_sync_time(), Some(h.clock.now()));
    }

    #[tokio::test]
    async fn test_invalid_config_update_is_rejected() {
        let h = harness(true);
        let err = h
            .engine
            .update_sync_config(SyncConfigUpdate {
                batch_size: Some(0),
                ..Default::default()
            })
            .unwrap_err();

        assert!(err.is_config_error());
        assert_eq!(h.engine.config().sync.batch_size, 10);
    }

    #[tokio::test]
    async fn test_trigger_sync_ignores_auto_sync_flag() {
        let h = harness(true);
        h.engine.set_auto_sync(false).unwrap();

        h.engine.trigger_sync();

        assert_eq!(h.engine.next_sync_time(), Some(h.clock.now()));
    }

    // -------------------------------------------------------------------------
    // Batches
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_run_batch_offline_is_skipped() {
        let h = harness(false);
        h.engine.queue_operation(spec("p-1")).await.unwrap();

        let outcome = h.engine.run_batch().await;

        assert_eq!(outcome, BatchOutcome::Skipped(SkipReason::Offline));
        assert!(h.client.dispatched_ids().is_empty());
    }

    #[tokio::test]
    async fn test_batch_dispatches_in_priority_order() {
        let h = harness(true);
        for (id, priority) in [
            ("a", Priority::Low),
            ("b", Priority::High),
            ("c", Priority::Medium),
            ("d", Priority::High),
        ] {
            h.engine
                .queue_operation(spec(id).with_priority(priority))
                .await
                .unwrap();
        }

        h.engine.run_batch().await;

        assert_eq!(h.client.dispatched_ids(), vec!["b", "d", "c", "a"]);
    }

    #[tokio::test]
    async fn test_batch_respects_batch_size() {
        let mut config = SyncConfig::default();
        config.sync.batch_size = 2;
        let h = harness_with(config, true);
        for i in 0..5 {
            h.engine.queue_operation(spec(&format!("p-{i}"))).await.unwrap();
        }

        let outcome = h.engine.run_batch().await;

        assert_eq!(outcome.summary().unwrap().dispatched, 2);
        assert_eq!(h.engine.pending_operations().len(), 3);
        assert_eq!(
            h.engine.next_sync_time(),
            Some(h.clock.now() + Duration::milliseconds(30_000))
        );
    }

    #[tokio::test]
    async fn test_successful_batch_updates_stats_and_clears_schedule() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.engine.queue_operation(spec("p-2")).await.unwrap();

        let outcome = h.engine.run_batch().await;

        assert_eq!(outcome.summary().unwrap().succeeded, 2);
        let status = h.engine.status();
        assert!(!status.is_syncing);
        assert_eq!(status.stats.completed_operations, 2);
        assert_eq!(status.stats.pending_operations, 0);
        assert_eq!(status.stats.total_operations, 2);
        assert_eq!(status.stats.last_successful_sync, Some(h.clock.now()));
        assert_eq!(status.last_sync_time, Some(h.clock.now()));
        assert_eq!(status.next_sync_time, None);
    }

    #[tokio::test]
    async fn test_running_average_of_batch_duration() {
        let clock = Arc::new(ManualClock::default());
        let client = Arc::new(SlowClient {
            clock: clock.clone(),
            step: Duration::milliseconds(200),
        });
        let engine = SyncEngine::builder(SyncConfig::default())
            .with_client(client)
            .with_clock(clock.clone())
            .online(true)
            .build()
            .unwrap();

        engine.queue_operation(spec("p-1")).await.unwrap();
        engine.queue_operation(spec("p-2")).await.unwrap();
        engine.run_batch().await;
        assert_eq!(engine.stats().average_sync_time, 400.0);

        engine.queue_operation(spec("p-3")).await.unwrap();
        engine.run_batch().await;
        // n = 2 completed before the batch + 1
        assert_eq!(engine.stats().average_sync_time, (400.0 * 2.0 + 200.0) / 3.0);
    }

    #[tokio::test]
    async fn test_total_failure_keeps_last_successful_sync() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", DispatchResult::retryable("timeout"));

        h.engine.run_batch().await;

        let status = h.engine.status();
        assert!(!status.is_syncing);
        assert_eq!(status.stats.last_successful_sync, None);
        assert!(status.last_sync_time.is_some());
        assert_eq!(status.pending_operations[0].retry_count, 1);
        assert_eq!(
            status.next_sync_time,
            Some(h.clock.now() + Duration::milliseconds(30_000))
        );
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        for _ in 0..3 {
            h.client.push("p-1", DispatchResult::retryable("503"));
        }

        h.engine.run_batch().await;
        h.engine.run_batch().await;
        assert_eq!(h.engine.pending_operations()[0].retry_count, 2);
        assert_eq!(h.engine.status().error_count, 0);

        let outcome = h.engine.run_batch().await;
        assert_eq!(outcome.summary().unwrap().failed, 1);

        let status = h.engine.status();
        assert!(status.pending_operations.is_empty());
        assert_eq!(status.failed_operations.len(), 1);
        assert_eq!(status.failed_operations[0].retry_count, 3);
        assert_eq!(status.stats.failed_operations, 1);
        assert_eq!(status.last_error.as_deref(), Some("503"));
        assert_eq!(status.error_count, 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_goes_straight_to_failed() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", DispatchResult::permanent("422 unprocessable"));

        h.engine.run_batch().await;

        let failed = h.engine.failed_operations();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].last_error.as_deref(), Some("422 unprocessable"));
    }

    #[tokio::test]
    async fn test_manual_retry_restores_budget() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", DispatchResult::permanent("400"));
        h.engine.run_batch().await;
        let id = h.engine.failed_operations()[0].id.clone();

        h.engine.retry_failed_operation(&id).await.unwrap();

        let pending = h.engine.pending_operations();
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].retry_count, 0);
        assert!(h.engine.failed_operations().is_empty());
        assert!(matches!(
            h.engine.retry_failed_operation(&id).await,
            Err(SyncError::OperationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_all_and_clear_failed() {
        let h = harness(true);
        for id in ["p-1", "p-2", "p-3"] {
            h.engine.queue_operation(spec(id)).await.unwrap();
            h.client.push(id, DispatchResult::permanent("400"));
        }
        h.engine.run_batch().await;
        assert_eq!(h.engine.failed_operations().len(), 3);

        assert_eq!(h.engine.retry_all_failed().await, 3);
        assert_eq!(h.engine.pending_operations().len(), 3);

        for id in ["p-1", "p-2", "p-3"] {
            h.client.push(id, DispatchResult::permanent("400"));
        }
        h.engine.run_batch().await;
        assert_eq!(h.engine.clear_failed().await, 3);
        assert!(h.engine.failed_operations().is_empty());
        assert_eq!(h.engine.stats().failed_operations, 0);
    }

    #[tokio::test]
    async fn test_remove_operation_is_idempotent() {
        let h = harness(true);
        let id = h.engine.queue_operation(spec("p-1")).await.unwrap();

        assert!(h.engine.remove_operation(&id).await);
        assert!(!h.engine.remove_operation(&id).await);
        assert_eq!(h.engine.stats().pending_operations, 0);
    }

    #[tokio::test]
    async fn test_update_priority_reorders_dispatch() {
        let h = harness(true);
        h.engine.queue_operation(spec("a")).await.unwrap();
        let b = h.engine.queue_operation(spec("b")).await.unwrap();

        h.engine
            .update_operation_priority(&b, Priority::High)
            .await
            .unwrap();
        h.engine.run_batch().await;

        assert_eq!(h.client.dispatched_ids(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_entity_status_tracking() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.engine
            .queue_operation(OperationSpec::new(
                OperationKind::Create,
                "inventory",
                "i-1",
                json!({}),
            ))
            .await
            .unwrap();
        h.client.push("i-1", DispatchResult::retryable("timeout"));

        h.engine.run_batch().await;

        let product = h.engine.entity_status("product").unwrap();
        assert!(!product.is_loading);
        assert_eq!(product.last_sync, Some(h.clock.now()));
        assert_eq!(product.error, None);

        let inventory = h.engine.entity_status("inventory").unwrap();
        assert!(!inventory.is_loading);
        assert_eq!(inventory.last_sync, None);
        assert_eq!(inventory.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_concurrent_run_batch_is_noop() {
        let client = Arc::new(GatedClient::default());
        let engine = Arc::new(
            SyncEngine::builder(SyncConfig::default())
                .with_client(client.clone())
                .with_clock(Arc::new(ManualClock::default()))
                .online(true)
                .build()
                .unwrap(),
        );
        engine.queue_operation(spec("p-1")).await.unwrap();

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.run_batch().await }
        });
        while client.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(engine.is_syncing());

        let second = engine.run_batch().await;
        assert_eq!(second, BatchOutcome::Skipped(SkipReason::AlreadySyncing));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        client.gate.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.summary().unwrap().succeeded, 1);
        assert!(!engine.is_syncing());
    }

    // -------------------------------------------------------------------------
    // Conflicts
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_conflict_blocks_operation_until_resolved() {
        let h = harness(true);
        let id = h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::DeletedRemotely));

        let outcome = h.engine.run_batch().await;
        assert_eq!(outcome.summary().unwrap().conflicts, 1);

        let status = h.engine.status();
        assert_eq!(status.pending_operations.len(), 1);
        assert_eq!(status.pending_operations[0].id, id);
        assert_eq!(status.pending_operations[0].retry_count, 0);
        assert_eq!(status.unresolved_conflicts, 1);
        assert_eq!(status.conflicts[0].kind, ConflictKind::DeletedRemotely);
        assert_eq!(status.conflicts[0].resolution, None);
        assert_eq!(
            status.entity_status["product"].error.as_deref(),
            Some("conflict: deleted_remotely")
        );

        h.engine.run_batch().await;
        assert_eq!(h.client.dispatched_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_remote_discards_operation() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::VersionMismatch));
        h.engine.run_batch().await;
        let conflict_id = h.engine.conflicts()[0].id.clone();

        h.engine
            .resolve_conflict(&conflict_id, ConflictResolution::Remote, None)
            .await
            .unwrap();

        let status = h.engine.status();
        assert!(status.pending_operations.is_empty());
        assert!(status.failed_operations.is_empty());
        assert!(status.conflicts.is_empty());
        assert_eq!(status.stats.completed_operations, 0);
        assert_eq!(status.stats.failed_operations, 0);
        assert_eq!(status.stats.conflicts_resolved, 1);
        assert_eq!(h.engine.all_conflicts().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_local_unblocks_and_schedules_now() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::ConcurrentEdit));
        h.engine.run_batch().await;
        let conflict_id = h.engine.conflicts()[0].id.clone();
        h.clock.advance(Duration::seconds(5));

        h.engine
            .resolve_conflict(&conflict_id, ConflictResolution::Local, None)
            .await
            .unwrap();
        assert_eq!(h.engine.next_sync_time(), Some(h.clock.now()));

        h.engine.run_batch().await;
        assert_eq!(h.client.dispatched_ids(), vec!["p-1", "p-1"]);
        assert_eq!(h.engine.stats().completed_operations, 1);
    }

    #[tokio::test]
    async fn test_merge_requires_payload_and_replaces_it() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::VersionMismatch));
        h.engine.run_batch().await;
        let conflict_id = h.engine.conflicts()[0].id.clone();

        let err = h
            .engine
            .resolve_conflict(&conflict_id, ConflictResolution::Merge, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MergePayloadRequired(_)));
        assert_eq!(h.engine.conflicts().len(), 1);

        let merged = Payload::new(json!({ "id": "p-1", "qty": 5 }));
        h.engine
            .resolve_conflict(&conflict_id, ConflictResolution::Merge, Some(merged.clone()))
            .await
            .unwrap();
        h.engine.run_batch().await;

        assert_eq!(h.client.last_payload(), Some(merged));
    }

    #[tokio::test]
    async fn test_resolution_errors() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::VersionMismatch));
        h.engine.run_batch().await;
        let conflict_id = h.engine.conflicts()[0].id.clone();

        assert!(matches!(
            h.engine
                .resolve_conflict("missing", ConflictResolution::Local, None)
                .await,
            Err(SyncError::ConflictNotFound(_))
        ));

        h.engine
            .resolve_conflict(&conflict_id, ConflictResolution::Skip, None)
            .await
            .unwrap();
        assert!(matches!(
            h.engine
                .resolve_conflict(&conflict_id, ConflictResolution::Local, None)
                .await,
            Err(SyncError::ConflictAlreadyResolved { .. })
        ));
        assert_eq!(h.engine.stats().conflicts_resolved, 1);
    }

    #[tokio::test]
    async fn test_auto_resolution_policy() {
        let mut config = SyncConfig::default();
        config.sync.conflict_policy = ConflictPolicy::Remote;
        let h = harness_with(config, true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::VersionMismatch));

        h.engine.run_batch().await;

        let status = h.engine.status();
        assert!(status.pending_operations.is_empty());
        assert!(status.conflicts.is_empty());
        assert_eq!(status.stats.conflicts_resolved, 1);
        assert_eq!(
            h.engine.all_conflicts()[0].resolution,
            Some(ConflictResolution::Remote)
        );
    }

    #[tokio::test]
    async fn test_local_policy_resends_on_next_tick() {
        let mut config = SyncConfig::default();
        config.sync.conflict_policy = ConflictPolicy::Local;
        let h = harness_with(config, true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::VersionMismatch));

        h.engine.run_batch().await;

        assert_eq!(h.engine.pending_operations().len(), 1);
        assert!(h.engine.conflicts().is_empty());
        assert_eq!(
            h.engine.next_sync_time(),
            Some(h.clock.now() + Duration::milliseconds(30_000))
        );

        h.engine.run_batch().await;
        assert!(h.engine.pending_operations().is_empty());
        assert_eq!(h.engine.stats().completed_operations, 1);
    }

    #[tokio::test]
    async fn test_resolved_conflicts_purged_after_retention() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::VersionMismatch));
        h.engine.run_batch().await;
        let conflict_id = h.engine.conflicts()[0].id.clone();
        h.engine
            .resolve_conflict(&conflict_id, ConflictResolution::Skip, None)
            .await
            .unwrap();

        h.clock.advance(Duration::days(6));
        assert_eq!(h.engine.purge_resolved_conflicts().await, 0);

        h.clock.advance(Duration::days(2));
        h.engine.run_batch().await;
        assert!(h.engine.all_conflicts().is_empty());
        assert_eq!(h.engine.stats().conflicts_resolved, 1);
    }

    // -------------------------------------------------------------------------
    // Offline actions
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_capture_evicts_oldest_at_capacity() {
        let mut config = SyncConfig::default();
        config.queue.max_size = 2;
        let h = harness_with(config, true);

        h.engine
            .capture_action(draft(HttpMethod::Post, "/api/inventory/1"))
            .await
            .unwrap();
        let second = h
            .engine
            .capture_action(draft(HttpMethod::Put, "/api/inventory/2"))
            .await
            .unwrap();
        let third = h
            .engine
            .capture_action(draft(HttpMethod::Delete, "/api/inventory/3"))
            .await
            .unwrap();

        let stats = h.engine.status().action_queue;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.percentage_full, 100.0);

        assert_eq!(h.engine.record_action_attempt(&second).await.unwrap(), 1);
        assert!(matches!(
            h.engine.record_action_attempt("missing").await,
            Err(SyncError::ActionNotFound(_))
        ));
        assert!(h.engine.remove_action(&third).await);
        assert_eq!(h.engine.status().action_queue.total, 1);
    }

    #[tokio::test]
    async fn test_capture_rejects_invalid_draft() {
        let h = harness(true);
        let err = h
            .engine
            .capture_action(draft(HttpMethod::Post, "api/relative"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_promote_actions() {
        let h = harness(true);
        let retried = h
            .engine
            .capture_action(draft(HttpMethod::Put, "/api/inventory/7"))
            .await
            .unwrap();
        h.engine.record_action_attempt(&retried).await.unwrap();
        h.engine
            .capture_action(draft(HttpMethod::Get, "/api/inventory"))
            .await
            .unwrap();
        h.engine
            .capture_action(draft(HttpMethod::Delete, "/api/inventory/9?force=true"))
            .await
            .unwrap();
        h.engine
            .capture_action(draft(HttpMethod::Post, "/"))
            .await
            .unwrap();

        let promotion = h.engine.promote_actions().await;

        assert_eq!(promotion.promoted.len(), 2);
        assert_eq!(promotion.held.len(), 1);
        let pending = h.engine.pending_operations();
        assert_eq!(pending[0].entity_id, "9");
        assert_eq!(pending[0].kind, OperationKind::Delete);
        assert_eq!(pending[1].entity_id, "7");
        assert_eq!(pending[1].kind, OperationKind::Update);
        assert_eq!(pending[1].entity_type, "inventory");

        // the action with no entity id stays queued
        assert_eq!(h.engine.status().action_queue.total, 1);
        assert_eq!(
            h.engine.next_sync_time(),
            Some(h.clock.now() + Duration::milliseconds(1000))
        );
    }

    #[tokio::test]
    async fn test_promotion_holds_actions_that_fail_validation() {
        let h = harness(true);
        let long_id = "x".repeat(200);
        let rejected = h
            .engine
            .capture_action(draft(HttpMethod::Put, &format!("/api/inventory/{long_id}")))
            .await
            .unwrap();
        h.engine
            .capture_action(draft(HttpMethod::Put, "/api/inventory/7"))
            .await
            .unwrap();

        let promotion = h.engine.promote_actions().await;

        assert_eq!(promotion.promoted.len(), 1);
        assert_eq!(promotion.held.len(), 1);
        assert_eq!(promotion.held[0].0, rejected);
        assert!(promotion.held[0].1.contains("entity_id"));

        assert_eq!(h.engine.pending_operations().len(), 1);
        assert_eq!(h.engine.pending_operations()[0].entity_id, "7");
        assert_eq!(h.engine.status().action_queue.total, 1);
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_state_survives_restore() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.engine.queue_operation(spec("p-2")).await.unwrap();
        h.engine.queue_operation(spec("p-3")).await.unwrap();
        h.client.push("p-1", conflict(ConflictKind::VersionMismatch));
        h.client.push("p-3", DispatchResult::permanent("400"));
        h.engine.run_batch().await;
        h.engine
            .capture_action(draft(HttpMethod::Post, "/api/inventory/1"))
            .await
            .unwrap();
        let before = h.engine.status();

        let restored = SyncEngine::builder(SyncConfig::default())
            .with_client(Arc::new(ScriptedClient::default()))
            .with_clock(h.clock.clone())
            .with_store(h.store.clone())
            .build()
            .unwrap();
        restored.restore().await;
        let after = restored.status();

        assert_eq!(after.pending_operations, before.pending_operations);
        assert_eq!(after.failed_operations, before.failed_operations);
        assert_eq!(after.conflicts, before.conflicts);
        assert_eq!(after.stats, before.stats);
        assert_eq!(after.action_queue, before.action_queue);
        assert_eq!(after.error_count, 0);
    }

    #[tokio::test]
    async fn test_restore_with_pending_work_schedules_when_online() {
        let h = harness(false);
        h.engine.queue_operation(spec("p-1")).await.unwrap();

        let restored = SyncEngine::builder(SyncConfig::default())
            .with_client(Arc::new(ScriptedClient::default()))
            .with_clock(h.clock.clone())
            .with_store(h.store.clone())
            .online(true)
            .build()
            .unwrap();
        restored.restore().await;

        assert_eq!(restored.next_sync_time(), Some(h.clock.now()));
    }

    #[tokio::test]
    async fn test_restore_malformed_record_starts_empty() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.store.insert(keys::OPERATIONS, "{ not json");

        let restored = SyncEngine::builder(SyncConfig::default())
            .with_client(Arc::new(ScriptedClient::default()))
            .with_store(h.store.clone())
            .build()
            .unwrap();
        restored.restore().await;

        let status = restored.status();
        assert!(status.pending_operations.is_empty());
        assert_eq!(status.error_count, 1);
        assert!(status.last_error.unwrap().contains(keys::OPERATIONS));
        // stats were intact and survive
        assert_eq!(status.stats.total_operations, 1);
    }

    #[tokio::test]
    async fn test_restore_read_failure_does_not_overwrite_store() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        let stored = h.store.peek(keys::OPERATIONS);
        h.store.set_failing(true);

        let restored = SyncEngine::builder(SyncConfig::default())
            .with_client(Arc::new(ScriptedClient::default()))
            .with_store(h.store.clone())
            .build()
            .unwrap();
        restored.restore().await;
        h.store.set_failing(false);

        assert_eq!(restored.status().error_count, 4);
        assert_eq!(h.store.peek(keys::OPERATIONS), stored);
    }

    #[tokio::test]
    async fn test_storage_failure_is_recorded_not_returned() {
        let emitter = Arc::new(RecordingEmitter::default());
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::builder(SyncConfig::default())
            .with_client(Arc::new(ScriptedClient::default()))
            .with_store(store.clone())
            .with_emitter(emitter.clone())
            .online(true)
            .build()
            .unwrap();
        store.set_failing(true);

        let result = engine.queue_operation(spec("p-1")).await;

        assert!(result.is_ok());
        let status = engine.status();
        assert!(status.last_error.is_some());
        assert_eq!(status.error_count, 1);
        assert_eq!(status.pending_count(), 1);
        assert_eq!(emitter.count("error:true"), 1);
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        use stockroom_db::Database;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockroom.db");

        let db = Arc::new(Database::open(&path).await.unwrap());
        let engine = SyncEngine::builder(SyncConfig::default())
            .with_client(Arc::new(ScriptedClient::default()))
            .with_store(db.clone())
            .build()
            .unwrap();
        let id = engine.queue_operation(spec("p-1")).await.unwrap();
        db.close().await;

        let db = Arc::new(Database::open(&path).await.unwrap());
        let restored = SyncEngine::builder(SyncConfig::default())
            .with_client(Arc::new(ScriptedClient::default()))
            .with_store(db.clone())
            .build()
            .unwrap();
        restored.restore().await;

        let pending = restored.pending_operations();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(restored.status().error_count, 0);
        db.close().await;
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_batch_events() {
        let emitter = Arc::new(RecordingEmitter::default());
        let client = Arc::new(ScriptedClient::default());
        let engine = SyncEngine::builder(SyncConfig::default())
            .with_client(client.clone())
            .with_emitter(emitter.clone())
            .online(true)
            .build()
            .unwrap();
        engine.queue_operation(spec("p-1")).await.unwrap();
        engine.queue_operation(spec("p-2")).await.unwrap();
        engine.queue_operation(spec("p-3")).await.unwrap();
        client.push("p-2", conflict(ConflictKind::ConcurrentEdit));
        client.push("p-3", DispatchResult::permanent("gone"));

        engine.run_batch().await;

        assert_eq!(emitter.count("conflict:concurrent_edit"), 1);
        assert_eq!(emitter.count("error:false:gone"), 1);
        assert_eq!(emitter.count("progress:1:1"), 1);
        assert_eq!(emitter.count("status"), 4);
    }

    #[tokio::test]
    async fn test_work_queued_mid_batch_keeps_its_deadline() {
        let client = Arc::new(GatedClient::default());
        let clock = Arc::new(ManualClock::default());
        let engine = Arc::new(
            SyncEngine::builder(SyncConfig::default())
                .with_client(client.clone())
                .with_clock(clock.clone())
                .online(true)
                .build()
                .unwrap(),
        );
        engine.queue_operation(spec("p-1")).await.unwrap();

        let batch = tokio::spawn({
            let engine = engine.clone();
            async move { engine.run_batch().await }
        });
        while client.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        engine.queue_operation(spec("p-2")).await.unwrap();

        client.gate.notify_one();
        batch.await.unwrap();

        assert_eq!(engine.pending_operations().len(), 1);
        assert_eq!(
            engine.next_sync_time(),
            Some(clock.now() + Duration::milliseconds(1000))
        );
    }

    #[tokio::test]
    async fn test_batch_counts_retry_attempts() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.engine.queue_operation(spec("p-2")).await.unwrap();
        h.client.push("p-1", DispatchResult::retryable("timeout"));

        let first = h.engine.run_batch().await;
        assert_eq!(first.summary().unwrap().retries, 0);
        assert_eq!(first.summary().unwrap().retrying, 1);

        let second = h.engine.run_batch().await;
        assert_eq!(second.summary().unwrap().dispatched, 1);
        assert_eq!(second.summary().unwrap().retries, 1);
        assert!(h.engine.pending_operations().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_interval_update_is_rejected() {
        let h = harness(true);
        h.engine.queue_operation(spec("p-1")).await.unwrap();
        h.client.push("p-1", DispatchResult::retryable("timeout"));

        let err = h
            .engine
            .update_sync_config(SyncConfigUpdate {
                sync_interval_ms: Some(u64::MAX / 2),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.is_config_error());

        h.engine.run_batch().await;
        assert_eq!(
            h.engine.next_sync_time(),
            Some(h.clock.now() + Duration::milliseconds(30_000))
        );
    }

    #[test]
    fn test_deadline_saturates_at_far_future() {
        let max = DateTime::<Utc>::MAX_UTC;
        assert_eq!(later(max, Duration::seconds(1)), max);

        let now = Utc::now();
        assert_eq!(later(now, Duration::seconds(1)), now + Duration::seconds(1));
    }
}
