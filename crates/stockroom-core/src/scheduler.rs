//! # Priority Scheduler
//!
//! Orders pending operations for dispatch and selects the next batch.
//!
//! ## Ordering Rule
//! ```text
//! inserted:  A:low   B:high   C:medium   D:high
//!
//! sort key:  (priority rank, insertion sequence)
//!
//! batch:     B  D  C  A
//!            └──┘  │  └── low
//!            high  medium
//! ```
//!
//! Sorting is an explicit O(n log n) step, run only when an operation is
//! added or its priority changes. There is no background re-sort and no
//! automatic escalation by age.

use crate::types::SyncOperation;

/// Stateless batch selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScheduler;

impl PriorityScheduler {
    /// Stable-sorts operations by priority rank, then insertion sequence.
    pub fn sort(operations: &mut [SyncOperation]) {
        operations.sort_by_key(|op| (op.priority.rank(), op.sequence));
    }

    /// Returns the first `batch_size` operations in dispatch order.
    pub fn select_batch(pending: &[SyncOperation], batch_size: usize) -> Vec<&SyncOperation> {
        Self::select_batch_where(pending, batch_size, |_| true)
    }

    /// Like [`select_batch`](Self::select_batch), skipping operations the
    /// predicate rejects (e.g. ones blocked on an unresolved conflict).
    pub fn select_batch_where<F>(
        pending: &[SyncOperation],
        batch_size: usize,
        mut eligible: F,
    ) -> Vec<&SyncOperation>
    where
        F: FnMut(&SyncOperation) -> bool,
    {
        let mut candidates: Vec<&SyncOperation> =
            pending.iter().filter(|op| eligible(op)).collect();
        candidates.sort_by_key(|op| (op.priority.rank(), op.sequence));
        candidates.truncate(batch_size);
        candidates
    }
}
