//! # stockroom-sync: Sync Engine for Stockroom
//!
//! Queues local mutations while offline and replays them against the remote
//! API once the network is back, in priority order, with bounded retries and
//! explicit conflict handling.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    SyncRunner (background task)                  │  │
//! │  │                                                                  │  │
//! │  │  Spawned on the host's tokio runtime                             │  │
//! │  │  Network watch + deadline → run_batch()                          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │                    SyncEngine (orchestrator)                     │  │
//! │  │                                                                  │  │
//! │  │  OperationStore · ConflictStore · BoundedActionQueue             │  │
//! │  │  PriorityScheduler · RetryPolicy        (stockroom-core)         │  │
//! │  └──────┬──────────────────────┬───────────────────────┬────────────┘  │
//! │         ▼                      ▼                       ▼               │
//! │  ┌────────────────┐  ┌──────────────────┐  ┌────────────────────────┐  │
//! │  │ RemoteClient   │  │ KeyValueStore    │  │ SyncEventEmitter       │  │
//! │  │                │  │                  │  │                        │  │
//! │  │ dispatch(op)   │  │ SQLite kv_store  │  │ status / progress /    │  │
//! │  │ → outcome      │  │ or in-memory     │  │ error / conflict       │  │
//! │  └────────────────┘  └──────────────────┘  └────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`engine`] - Main `SyncEngine` orchestrator and builder
//! - [`runner`] - Background loop driving batches
//! - [`client`] - Remote dispatch seam and outcomes
//! - [`storage`] - Key-value persistence seam
//! - [`status`] - Status snapshot and event hooks
//! - [`clock`] - Injectable time source
//! - [`config`] - Engine configuration (TOML + env)
//! - [`error`] - Sync error types
//! - [`telemetry`] - Tracing setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stockroom_sync::{SyncConfig, SyncEngine, SyncRunner};
//! use stockroom_db::Database;
//!
//! let config = SyncConfig::load_or_default(None);
//! let db = Database::open("stockroom.db").await?;
//!
//! let engine = Arc::new(
//!     SyncEngine::builder(config)
//!         .with_store(Arc::new(db))
//!         .with_client(Arc::new(my_api_client))
//!         .build()?,
//! );
//! engine.restore().await;
//!
//! let handle = SyncRunner::spawn(engine.clone(), network_rx);
//! engine.queue_operation(spec).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod runner;
pub mod status;
pub mod storage;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{DispatchResult, OfflineClient, RemoteClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConflictPolicy, SyncConfig, SyncConfigUpdate};
pub use engine::{
    BatchOutcome, BatchSummary, Promotion, SkipReason, SyncEngine, SyncEngineBuilder,
};
pub use error::{SyncError, SyncResult};
pub use runner::{SyncRunner, SyncRunnerHandle};
pub use status::{NoOpEmitter, SyncEventEmitter, SyncStatus};
pub use storage::{KeyValueStore, MemoryStore};
pub use telemetry::init_tracing;
