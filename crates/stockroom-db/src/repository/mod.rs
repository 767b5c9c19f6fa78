//! # Repository Module
//!
//! Database repository implementations for Stockroom.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SyncEngine                                                            │
//! │       │                                                                 │
//! │       │  db.kv().set("sync_operations", json)                           │
//! │       ▼                                                                 │
//! │  KvRepository                                                          │
//! │  ├── get(&self, key)                                                   │
//! │  ├── set(&self, key, value)                                            │
//! │  └── remove(&self, key)                                                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database (kv_store table)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`kv::KvRepository`] - Whole-record key-value storage

pub mod kv;
