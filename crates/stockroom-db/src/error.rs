//! # Store Error Types
//!
//! Failures of the sync record store, tagged with the record they hit.
//!
//! ## Classification
//! ```text
//! sqlx::Error while touching key K
//!     │
//!     ├── PoolClosed                 → DbError::Closed
//!     ├── PoolTimedOut               → DbError::Busy(K)
//!     ├── "database is locked"       → DbError::Busy(K)
//!     └── anything else              → DbError::Read / DbError::Write { key: K }
//!
//! Open, Closed, Busy    the store as a whole is unreachable
//! Read, Write, Schema   one statement failed, the store may still work
//! ```

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The database file could not be opened or created.
    #[error("Cannot open sync store at {location}: {reason}")]
    Open { location: String, reason: String },

    /// The embedded schema could not be applied or inspected.
    #[error("Sync store schema error: {0}")]
    Schema(String),

    #[error("Reading record '{key}' failed: {reason}")]
    Read { key: String, reason: String },

    #[error("Writing record '{key}' failed: {reason}")]
    Write { key: String, reason: String },

    #[error("Sync store is busy (record '{0}')")]
    Busy(String),

    #[error("Sync store is closed")]
    Closed,
}

impl DbError {
    pub(crate) fn open(location: &str, reason: impl Display) -> Self {
        DbError::Open {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn read(key: &str, err: sqlx::Error) -> Self {
        Self::classify(key, err, |key, reason| DbError::Read { key, reason })
    }

    pub(crate) fn write(key: &str, err: sqlx::Error) -> Self {
        Self::classify(key, err, |key, reason| DbError::Write { key, reason })
    }

    fn classify(key: &str, err: sqlx::Error, record: fn(String, String) -> DbError) -> Self {
        match err {
            sqlx::Error::PoolClosed => DbError::Closed,
            sqlx::Error::PoolTimedOut => DbError::Busy(key.to_string()),
            sqlx::Error::Database(e) if e.message().contains("database is locked") => {
                DbError::Busy(key.to_string())
            }
            other => record(key.to_string(), other.to_string()),
        }
    }

    /// True when the store as a whole cannot be reached, rather than a
    /// single statement failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DbError::Open { .. } | DbError::Busy(_) | DbError::Closed
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;
