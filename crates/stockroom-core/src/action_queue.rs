//! # Bounded Action Queue
//!
//! Capacity-limited FIFO of raw offline actions captured before they are
//! normalized into sync operations.
//!
//! ## Eviction Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 enqueue() on a full queue (max_size = 4)                │
//! │                                                                         │
//! │   before:  [ A ][ B ][ C ][ D ]          ◄── A is the oldest            │
//! │                                                                         │
//! │   enqueue(E)                                                            │
//! │     1. evict front  → A is returned to the caller                       │
//! │     2. push back    → E stamped with id, timestamp, retry_count = 0     │
//! │                                                                         │
//! │   after:   [ B ][ C ][ D ][ E ]                                         │
//! │                                                                         │
//! │  The newest action is NEVER dropped. Sustained offline pressure loses  │
//! │  the oldest captures silently; watch `percentage_full` to detect it.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{OfflineAction, OfflineActionDraft};
use crate::{DEFAULT_MAX_RETRIES, DEFAULT_QUEUE_MAX_SIZE};

/// Summary counts for the action queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionQueueStats {
    pub total: usize,
    /// Never attempted (`retry_count == 0`).
    pub pending: usize,
    /// Attempted but still within budget.
    pub retrying: usize,
    /// Budget exhausted (`retry_count >= max_retries`).
    pub failed: usize,
    /// `total / max_size * 100`.
    pub percentage_full: f64,
}

/// Result of an [`BoundedActionQueue::enqueue`] call.
#[derive(Debug, Clone)]
pub struct Enqueued {
    /// Id stamped on the new action.
    pub id: String,
    /// The oldest action, if capacity forced it out.
    pub evicted: Option<OfflineAction>,
}

/// FIFO of offline actions with oldest-first eviction.
///
/// Serializes directly as the persisted `offline_action_queue` record:
/// `{ queue, maxSize, retryAttempts }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundedActionQueue {
    queue: VecDeque<OfflineAction>,
    max_size: usize,
    /// Retry budget stamped on actions that do not specify one.
    retry_attempts: u32,
}

impl Default for BoundedActionQueue {
    fn default() -> Self {
        BoundedActionQueue::new(DEFAULT_QUEUE_MAX_SIZE, DEFAULT_MAX_RETRIES)
    }
}

impl BoundedActionQueue {
    /// Creates an empty queue. A `max_size` of 0 is treated as 1.
    pub fn new(max_size: usize, retry_attempts: u32) -> Self {
        BoundedActionQueue {
            queue: VecDeque::with_capacity(max_size.max(1)),
            max_size: max_size.max(1),
            retry_attempts,
        }
    }

    /// Appends a newly stamped action, evicting the oldest when full.
    ///
    /// Never blocks, never fails.
    pub fn enqueue(&mut self, draft: OfflineActionDraft, now: DateTime<Utc>) -> Enqueued {
        let evicted = if self.queue.len() >= self.max_size {
            self.queue.pop_front()
        } else {
            None
        };

        let action = OfflineAction {
            id: Uuid::new_v4().to_string(),
            action_type: draft.action_type,
            endpoint: draft.endpoint,
            method: draft.method,
            payload: draft.payload,
            tenant_id: draft.tenant_id,
            user_id: draft.user_id,
            timestamp: now,
            retry_count: 0,
            max_retries: draft.max_retries.unwrap_or(self.retry_attempts),
        };
        let id = action.id.clone();
        self.queue.push_back(action);

        Enqueued { id, evicted }
    }

    /// Removes an action. Unknown ids are a no-op.
    ///
    /// Returns whether something was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|a| a.id != id);
        self.queue.len() != before
    }

    /// Removes every listed action. Unknown ids are ignored.
    ///
    /// Returns how many actions were removed.
    pub fn remove_many<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let before = self.queue.len();
        self.queue.retain(|a| !ids.contains(a.id.as_str()));
        before - self.queue.len()
    }

    /// Stable partition: first attempts ahead of retries.
    ///
    /// Relative order inside each partition is preserved, so retries are
    /// deprioritized but never dropped.
    pub fn reorder(&mut self) {
        let (fresh, retries): (Vec<_>, Vec<_>) =
            self.queue.drain(..).partition(|a| a.retry_count == 0);
        self.queue.extend(fresh);
        self.queue.extend(retries);
    }

    /// Bumps an action's retry count. Returns the new count, or `None` for
    /// an unknown id.
    pub fn record_attempt(&mut self, id: &str) -> Option<u32> {
        let action = self.queue.iter_mut().find(|a| a.id == id)?;
        action.retry_count += 1;
        Some(action.retry_count)
    }

    pub fn stats(&self) -> ActionQueueStats {
        let mut stats = ActionQueueStats {
            total: self.queue.len(),
            pending: 0,
            retrying: 0,
            failed: 0,
            percentage_full: self.queue.len() as f64 / self.max_size as f64 * 100.0,
        };

        for action in &self.queue {
            if action.retry_count == 0 {
                stats.pending += 1;
            } else if action.retry_count < action.max_retries {
                stats.retrying += 1;
            } else {
                stats.failed += 1;
            }
        }

        stats
    }

    pub fn get(&self, id: &str) -> Option<&OfflineAction> {
        self.queue.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OfflineAction> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// Changes the budget stamped on future actions. Queued actions keep theirs.
    pub fn set_retry_attempts(&mut self, retry_attempts: u32) {
        self.retry_attempts = retry_attempts;
    }

    /// Changes capacity, evicting oldest entries if the queue is now over.
    ///
    /// Returns the evicted actions, oldest first.
    pub fn resize(&mut self, max_size: usize) -> Vec<OfflineAction> {
        self.max_size = max_size.max(1);
        let overflow = self.queue.len().saturating_sub(self.max_size);
        self.queue.drain(..overflow).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
