//! # stockroom-core: Sync Domain Logic for Stockroom
//!
//! The queues, stores and scheduling rules behind Stockroom's offline-first
//! sync engine, as plain data structures with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Stockroom Sync Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Host UI (inventory, products, ...)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ queue_operation / resolve_conflict     │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            stockroom-sync (SyncEngine, SyncRunner)              │   │
//! │  │      scheduling, dispatch, persistence, status events           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockroom-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐            │   │
//! │  │  │ action_queue │ │ operation_   │ │ conflict_    │            │   │
//! │  │  │ bounded FIFO │ │ store        │ │ store        │            │   │
//! │  │  └──────────────┘ └──────────────┘ └──────────────┘            │   │
//! │  │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐            │   │
//! │  │  │ retry        │ │ scheduler    │ │ validation   │            │   │
//! │  │  └──────────────┘ └──────────────┘ └──────────────┘            │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CLOCK READS • NO LOGGING • PLAIN DATA            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              stockroom-db (durable key-value store)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (SyncOperation, SyncConflict, OfflineAction, ...)
//! - [`action_queue`] - Capacity-limited FIFO of raw offline actions
//! - [`operation_store`] - Pending/failed/completed operation sets
//! - [`conflict_store`] - Conflict records and resolution counters
//! - [`retry`] - Retry budget decisions
//! - [`scheduler`] - Priority ordering and batch selection
//! - [`validation`] - Input checks
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Time is an argument**: stores take `now` from the caller, so tests
//!    drive them with fixed instants.
//! 2. **Counters move with sets**: every transition updates its counter in
//!    the same call.
//! 3. **Explicit Errors**: invalid requests are typed errors, never panics.
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use stockroom_core::{OperationKind, OperationSpec, OperationStore, Priority};
//!
//! let mut store = OperationStore::default();
//! let low = store.add(
//!     OperationSpec::new(OperationKind::Update, "product", "p-1", serde_json::json!({}))
//!         .with_priority(Priority::Low),
//!     Utc::now(),
//! );
//! let high = store.add(
//!     OperationSpec::new(OperationKind::Create, "inventory", "i-9", serde_json::json!({}))
//!         .with_priority(Priority::High),
//!     Utc::now(),
//! );
//!
//! let order: Vec<_> = store.pending().iter().map(|op| op.id.clone()).collect();
//! assert_eq!(order, vec![high, low]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod action_queue;
pub mod conflict_store;
pub mod error;
pub mod operation_store;
pub mod retry;
pub mod scheduler;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use action_queue::{ActionQueueStats, BoundedActionQueue, Enqueued};
pub use conflict_store::ConflictStore;
pub use error::{CoreError, CoreResult, ValidationError};
pub use operation_store::{OperationCounters, OperationStore, OperationStoreRecord};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::PriorityScheduler;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Retry budget for operations and actions that do not specify one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound accepted for a caller-supplied retry budget.
pub const MAX_RETRY_BUDGET: u32 = 100;

/// Default capacity of the offline action queue.
pub const DEFAULT_QUEUE_MAX_SIZE: usize = 100;

/// Completed operation ids kept for diagnostics.
pub const COMPLETED_HISTORY_LIMIT: usize = 50;

/// Resolved conflicts older than this are purged.
pub const CONFLICT_RETENTION_DAYS: i64 = 7;

/// Default interval between scheduled batches.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 30_000;

/// Delay between `queue_operation` and the sync it schedules.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;

/// Default number of operations dispatched per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;
