//! # stockroom-db: Durable Storage for Stockroom
//!
//! SQLite key-value storage for the sync engine's persisted records.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Stockroom Persistence Flow                         │
//! │                                                                         │
//! │  SyncEngine::persist()                                                 │
//! │       │  serde_json::to_string(record)                                  │
//! │       ▼                                                                 │
//! │  KeyValueStore trait (stockroom-sync)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  stockroom-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ KvRepository  │    │    schema    │  │   │
//! │  │   │(database.rs)  │◄───│ get / set     │    │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ remove        │    │ 001_kv.sql   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`database`] - Opening and closing the store
//! - [`schema`] - Embedded migrations and schema status
//! - [`error`] - Store errors, tagged with the record key
//! - [`repository`] - Record access
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockroom_db::Database;
//!
//! let db = Database::open("stockroom.db").await?;
//! db.kv().set("sync_stats", "{}").await?;
//! let raw = db.kv().get("sync_stats").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod database;
pub mod error;
pub mod repository;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use database::Database;

pub use repository::kv::KvRepository;
pub use schema::SchemaStatus;
