//! # Sync Error Types
//!
//! Error types for the sync engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Storage      │  │     Serialization       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  StorageFailed  │  │  SerializationFailed    │ │
//! │  │  ConfigLoad...  │  │  StorageUnavail │  │  DeserializationFailed  │ │
//! │  │  ConfigSave...  │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────┐  ┌─────────────────────────┐ │
//! │  │  Caller Input                       │  │      Internal           │ │
//! │  │                                     │  │                         │ │
//! │  │  OperationNotFound  ActionNotFound  │  │  ChannelError           │ │
//! │  │  ConflictNotFound   MergePayload... │  │  Internal               │ │
//! │  │  Validation         ConflictAlre... │  │                         │ │
//! │  └─────────────────────────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only caller mistakes are returned as `Err` from engine entry points.
//! Storage and dispatch faults are recorded on the engine status instead.

use stockroom_core::CoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every failure the engine can report.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Durable storage read or write failed.
    #[error("Storage error: {0}")]
    StorageFailed(String),

    /// The storage backend cannot be reached at all.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// A persisted record could not be parsed.
    #[error("Malformed persisted record '{key}': {reason}")]
    DeserializationFailed { key: String, reason: String },

    // =========================================================================
    // Caller Input Errors
    // =========================================================================
    #[error("Sync operation not found: {0}")]
    OperationNotFound(String),

    #[error("Sync conflict not found: {0}")]
    ConflictNotFound(String),

    #[error("Offline action not found: {0}")]
    ActionNotFound(String),

    #[error("Sync conflict {id} is already resolved ({resolution})")]
    ConflictAlreadyResolved { id: String, resolution: String },

    #[error("Merge resolution for conflict {0} requires a merged payload")]
    MergePayloadRequired(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OperationNotFound(id) => SyncError::OperationNotFound(id),
            CoreError::ConflictNotFound(id) => SyncError::ConflictNotFound(id),
            CoreError::ConflictAlreadyResolved { id, resolution } => {
                SyncError::ConflictAlreadyResolved { id, resolution }
            }
            CoreError::Validation(e) => SyncError::Validation(e.to_string()),
        }
    }
}

impl From<stockroom_core::ValidationError> for SyncError {
    fn from(err: stockroom_core::ValidationError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<stockroom_db::DbError> for SyncError {
    fn from(err: stockroom_db::DbError) -> Self {
        if err.is_unavailable() {
            SyncError::StorageUnavailable(err.to_string())
        } else {
            SyncError::StorageFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if retrying the same call could succeed.
    ///
    /// Only storage faults (disk busy, store closed mid-write) qualify.
    /// Dispatch failures never surface as `SyncError`; they are outcomes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::StorageFailed(_) | SyncError::StorageUnavailable(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if this error came from durable storage.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            SyncError::StorageFailed(_)
                | SyncError::StorageUnavailable(_)
                | SyncError::DeserializationFailed { .. }
        )
    }
}
