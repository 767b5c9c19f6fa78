//! # Error Types
//!
//! Domain-specific error types for stockroom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockroom-core errors (this file)                                     │
//! │  ├── CoreError        - Store lookups and resolution rules             │
//! │  └── ValidationError  - Malformed operation/action input               │
//! │                                                                         │
//! │  stockroom-db errors (separate crate)                                  │
//! │  └── DbError          - Key-value storage failures                     │
//! │                                                                         │
//! │  stockroom-sync errors (separate crate)                                │
//! │  └── SyncError        - What the host UI sees                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → host UI               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-operation dispatch failures are NOT errors at this level. They are
//! state transitions recorded by the stores.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised by the sync stores when a caller asks for something invalid.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No pending or failed operation has this id.
    #[error("Sync operation not found: {0}")]
    OperationNotFound(String),

    /// No recorded conflict has this id.
    #[error("Sync conflict not found: {0}")]
    ConflictNotFound(String),

    /// The conflict already carries a resolution.
    ///
    /// ## When This Occurs
    /// - Double click on "resolve" in the UI
    /// - Auto-resolution raced with a manual decision
    #[error("Sync conflict {id} is already resolved ({resolution})")]
    ConflictAlreadyResolved { id: String, resolution: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for operation specs and offline actions.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., endpoint without leading slash).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
