//! # Validation Module
//!
//! Input checks applied before anything reaches the stores.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  host UI ── queue_operation / capture_action ──► SyncEngine            │
//! │                                                     │                   │
//! │                                   THIS MODULE ◄─────┘                   │
//! │                                   (reject bad input as SyncError)       │
//! │                                                     │                   │
//! │                                                     ▼                   │
//! │                               OperationStore / BoundedActionQueue       │
//! │                               (assume well-formed input)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockroom_core::validation::validate_operation_spec;
//! use stockroom_core::{OperationKind, OperationSpec};
//!
//! let spec = OperationSpec::new(OperationKind::Update, "product", "p-1", serde_json::json!({}));
//! assert!(validate_operation_spec(&spec).is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::{OfflineActionDraft, OperationSpec};
use crate::MAX_RETRY_BUDGET;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_ENTITY_TYPE_LEN: usize = 64;
const MAX_ENTITY_ID_LEN: usize = 128;
const MAX_ENDPOINT_LEN: usize = 2048;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates an entity type tag.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Lowercase letters, digits, `_` and `-` only
pub fn validate_entity_type(entity_type: &str) -> ValidationResult<()> {
    require("entity_type", entity_type)?;

    if entity_type.len() > MAX_ENTITY_TYPE_LEN {
        return Err(ValidationError::TooLong {
            field: "entity_type".to_string(),
            max: MAX_ENTITY_TYPE_LEN,
        });
    }

    if !entity_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "entity_type".to_string(),
            reason: "must contain only lowercase letters, digits, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(())
}

pub fn validate_entity_id(entity_id: &str) -> ValidationResult<()> {
    require("entity_id", entity_id)?;

    if entity_id.len() > MAX_ENTITY_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "entity_id".to_string(),
            max: MAX_ENTITY_ID_LEN,
        });
    }

    Ok(())
}

/// Validates a retry budget.
pub fn validate_max_retries(max_retries: u32) -> ValidationResult<()> {
    if max_retries > MAX_RETRY_BUDGET {
        return Err(ValidationError::OutOfRange {
            field: "max_retries".to_string(),
            min: 0,
            max: MAX_RETRY_BUDGET as i64,
        });
    }
    Ok(())
}

/// Validates an API endpoint path.
///
/// ## Rules
/// - Must not be empty
/// - Must start with `/`
/// - At most 2048 characters
pub fn validate_endpoint(endpoint: &str) -> ValidationResult<()> {
    require("endpoint", endpoint)?;

    if !endpoint.starts_with('/') {
        return Err(ValidationError::InvalidFormat {
            field: "endpoint".to_string(),
            reason: "must start with '/'".to_string(),
        });
    }

    if endpoint.len() > MAX_ENDPOINT_LEN {
        return Err(ValidationError::TooLong {
            field: "endpoint".to_string(),
            max: MAX_ENDPOINT_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

pub fn validate_operation_spec(spec: &OperationSpec) -> ValidationResult<()> {
    validate_entity_type(&spec.entity_type)?;
    validate_entity_id(&spec.entity_id)?;
    if let Some(max_retries) = spec.max_retries {
        validate_max_retries(max_retries)?;
    }
    Ok(())
}

pub fn validate_action_draft(draft: &OfflineActionDraft) -> ValidationResult<()> {
    validate_entity_type(&draft.action_type)?;
    validate_endpoint(&draft.endpoint)?;
    require("tenant_id", &draft.tenant_id)?;
    require("user_id", &draft.user_id)?;
    if let Some(max_retries) = draft.max_retries {
        validate_max_retries(max_retries)?;
    }
    Ok(())
}

fn require(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}
