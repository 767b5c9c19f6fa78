//! # Retry Policy
//!
//! Decides whether a failed operation is retried and when it gives up.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  retry_count vs max_retries         decision                            │
//! │  ──────────────────────────         ────────                            │
//! │  retry_count == 0                   RetryNow    (first attempt)         │
//! │  retry_count >= max                 GiveUp      (demote to failed)      │
//! │  otherwise                          RetryLater  (next sync tick)        │
//! │                                                                         │
//! │  Every operation gets its first attempt, even with a zero budget.      │
//! │  There is no per-operation backoff. "Later" means the orchestrator's   │
//! │  next scheduled batch, which runs on the fixed global sync interval.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::types::SyncOperation;

/// Outcome of evaluating an operation's retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryDecision {
    /// Eligible for the batch being assembled now.
    RetryNow,
    /// Stays pending until the next scheduled sync.
    RetryLater,
    /// Budget exhausted; belongs in the failed set.
    GiveUp,
}

/// Fixed-interval retry policy capped by each operation's `max_retries`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy;

impl RetryPolicy {
    /// Pure decision on `(retry_count, max_retries)`.
    pub const fn evaluate(retry_count: u32, max_retries: u32) -> RetryDecision {
        if retry_count == 0 {
            RetryDecision::RetryNow
        } else if retry_count >= max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryLater
        }
    }

    pub const fn decide(operation: &SyncOperation) -> RetryDecision {
        Self::evaluate(operation.retry_count, operation.max_retries)
    }
}
