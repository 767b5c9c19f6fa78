//! # Domain Types
//!
//! Core domain types used throughout the Stockroom sync engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  OfflineAction  │   │  SyncOperation  │   │  SyncConflict   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  endpoint       │──►│  kind           │──►│  operation_id   │       │
//! │  │  method         │   │  entity_type    │   │  kind           │       │
//! │  │  payload        │   │  entity_id      │   │  local/remote   │       │
//! │  │  retry_count    │   │  priority       │   │  resolution     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │   raw capture            normalized queue      needs a decision         │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   SyncStats     │   │EntitySyncStatus │                             │
//! │  │  (aggregates)   │   │ (per entity)    │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Persisted Field Names
//! Records are written to durable storage as JSON with camelCase field names
//! so the stored layout stays stable regardless of Rust naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::DEFAULT_MAX_RETRIES;

// =============================================================================
// Payload
// =============================================================================

/// Opaque entity data carried by operations, actions and conflicts.
///
/// The engine never looks inside a payload. It is handed to the remote API
/// client and to the conflict resolver exactly as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(serde_json::Value);

impl Payload {
    /// Wraps a JSON value.
    pub fn new(value: serde_json::Value) -> Self {
        Payload(value)
    }

    /// An empty (null) payload.
    pub fn empty() -> Self {
        Payload(serde_json::Value::Null)
    }

    /// Borrows the underlying JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Consumes the payload and returns the JSON value.
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload(value)
    }
}

// =============================================================================
// Operation Kind
// =============================================================================

/// The mutation a sync operation applies remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Dispatch priority class.
///
/// ## Ordering
/// ```text
/// High (rank 0)  ──►  Medium (rank 1)  ──►  Low (rank 2)
/// ```
/// Within a class, operations dispatch in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort rank: lower dispatches first.
    #[inline]
    pub const fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

// =============================================================================
// Sync Operation
// =============================================================================

/// A normalized, queued mutation awaiting remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub kind: OperationKind,

    /// Entity tag: "product", "inventory", "notification", "user", ...
    pub entity_type: String,

    pub entity_id: String,

    #[ts(type = "unknown")]
    pub payload: Payload,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// Failed dispatch attempts so far.
    pub retry_count: u32,

    /// Attempts allowed before the operation is demoted to failed.
    pub max_retries: u32,

    pub priority: Priority,

    /// Insertion sequence; FIFO tie-breaker within a priority class.
    #[serde(default)]
    #[ts(type = "number")]
    pub sequence: u64,

    /// Message of the most recent dispatch failure.
    #[serde(default)]
    pub last_error: Option<String>,
}

/// What the caller supplies to queue a new operation.
///
/// The store stamps id, timestamp, sequence and `retry_count = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl OperationSpec {
    /// Creates a spec with medium priority and the default retry budget.
    pub fn new(
        kind: OperationKind,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: impl Into<Payload>,
    ) -> Self {
        OperationSpec {
            kind,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            payload: payload.into(),
            priority: Priority::default(),
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Retry budget, falling back to the crate default (3).
    pub fn max_retries_or_default(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }
}

// =============================================================================
// Conflicts
// =============================================================================

/// How a conflict was detected upstream.
///
/// ```text
/// version_mismatch  - remote version/etag newer than the one assumed
/// concurrent_edit   - remote modified after our base snapshot
/// deleted_locally   - we deleted it, remote still has live edits
/// deleted_remotely  - remote deleted it, we still mutate it
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    VersionMismatch,
    ConcurrentEdit,
    DeletedLocally,
    DeletedRemotely,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::VersionMismatch => write!(f, "version_mismatch"),
            ConflictKind::ConcurrentEdit => write!(f, "concurrent_edit"),
            ConflictKind::DeletedLocally => write!(f, "deleted_locally"),
            ConflictKind::DeletedRemotely => write!(f, "deleted_remotely"),
        }
    }
}

/// A resolution decision for a conflict.
///
/// ## Strategy Semantics
/// ```text
/// ┌──────────┬──────────────────────────────────────────────────────────┐
/// │ local    │ local snapshot wins, operation re-dispatched unchanged   │
/// │ remote   │ remote wins, local operation discarded                   │
/// │ merge    │ caller-supplied payload substituted, then re-dispatched  │
/// │ skip     │ nobody wins, operation discarded                         │
/// └──────────┴──────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Local,
    Remote,
    Merge,
    Skip,
}

impl ConflictResolution {
    /// True when the originating operation is dropped without re-dispatch.
    pub fn discards_operation(&self) -> bool {
        matches!(self, ConflictResolution::Remote | ConflictResolution::Skip)
    }
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictResolution::Local => write!(f, "local"),
            ConflictResolution::Remote => write!(f, "remote"),
            ConflictResolution::Merge => write!(f, "merge"),
            ConflictResolution::Skip => write!(f, "skip"),
        }
    }
}

/// A detected disagreement between local and remote state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: String,

    /// The operation whose dispatch surfaced this conflict.
    pub operation_id: String,

    pub kind: ConflictKind,

    #[ts(type = "unknown")]
    pub local_data: Payload,

    #[ts(type = "unknown")]
    pub remote_data: Payload,

    #[ts(as = "String")]
    pub detected_at: DateTime<Utc>,

    /// `None` until a decision is recorded.
    #[serde(default)]
    pub resolution: Option<ConflictResolution>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SyncConflict {
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

/// What the orchestrator supplies to record a conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictSpec {
    pub operation_id: String,
    pub kind: ConflictKind,
    pub local_data: Payload,
    pub remote_data: Payload,
}

// =============================================================================
// Offline Actions
// =============================================================================

/// HTTP method of a captured offline action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// The sync operation kind this method maps to.
    ///
    /// Reads (`GET`) are never replayed and map to `None`.
    pub fn operation_kind(&self) -> Option<OperationKind> {
        match self {
            HttpMethod::Get => None,
            HttpMethod::Post => Some(OperationKind::Create),
            HttpMethod::Put | HttpMethod::Patch => Some(OperationKind::Update),
            HttpMethod::Delete => Some(OperationKind::Delete),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
            HttpMethod::Patch => write!(f, "PATCH"),
        }
    }
}

/// A raw user-initiated request captured while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAction {
    pub id: String,

    /// Entity tag of the action ("product", "inventory", ...).
    #[serde(rename = "type")]
    pub action_type: String,

    /// API path, e.g. `/api/products/42`.
    pub endpoint: String,

    pub method: HttpMethod,

    #[ts(type = "unknown")]
    pub payload: Payload,

    pub tenant_id: String,

    pub user_id: String,

    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,

    pub retry_count: u32,

    pub max_retries: u32,
}

impl OfflineAction {
    /// Normalizes this action into a sync operation spec.
    ///
    /// ## Mapping
    /// ```text
    /// POST        → create
    /// PUT / PATCH → update
    /// DELETE      → delete
    /// GET         → None (reads are not replayed)
    /// ```
    ///
    /// The entity id comes from the payload's `"id"` field when present,
    /// otherwise from the last non-empty segment of the endpoint path.
    pub fn to_operation_spec(&self) -> Option<OperationSpec> {
        let kind = self.method.operation_kind()?;
        let entity_id = self.entity_id()?;

        Some(
            OperationSpec::new(kind, self.action_type.clone(), entity_id, self.payload.clone())
                .with_max_retries(self.max_retries),
        )
    }

    fn entity_id(&self) -> Option<String> {
        match self.payload.as_value().get("id") {
            Some(serde_json::Value::String(id)) if !id.is_empty() => return Some(id.clone()),
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }

        let path = self.endpoint.split('?').next().unwrap_or_default();
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .last()
            .map(str::to_string)
    }
}

/// What the caller supplies to capture an offline action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineActionDraft {
    #[serde(rename = "type")]
    pub action_type: String,
    pub endpoint: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub payload: Payload,
    pub tenant_id: String,
    pub user_id: String,
    /// Falls back to the queue's configured retry attempts.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

// =============================================================================
// Statistics
// =============================================================================

/// Aggregate sync statistics.
///
/// Derived state: every counter is updated incrementally on the transition
/// that changes it, never recomputed by scanning operation history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    #[ts(type = "number")]
    pub total_operations: u64,
    #[ts(type = "number")]
    pub pending_operations: u64,
    #[ts(type = "number")]
    pub completed_operations: u64,
    #[ts(type = "number")]
    pub failed_operations: u64,
    #[ts(type = "number")]
    pub conflicts_resolved: u64,
    #[ts(as = "Option<String>")]
    pub last_successful_sync: Option<DateTime<Utc>>,
    /// Running mean of batch duration in milliseconds.
    pub average_sync_time: f64,
}

/// Per-entity-type sync state for UI loading indicators.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncStatus {
    #[ts(as = "Option<String>")]
    pub last_sync: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub error: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(method: HttpMethod, endpoint: &str, payload: serde_json::Value) -> OfflineAction {
        OfflineAction {
            id: "a-1".to_string(),
            action_type: "product".to_string(),
            endpoint: endpoint.to_string(),
            method,
            payload: Payload::new(payload),
            tenant_id: "t-1".to_string(),
            user_id: "u-1".to_string(),
            timestamp: Utc::now(),
            retry_count: 0,
            max_retries: 3,
        }
    }

    #[test]
    fn test_priority_rank_order() {
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_conflict_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ConflictKind::DeletedRemotely).unwrap();
        assert_eq!(json, "\"deleted_remotely\"");
    }

    #[test]
    fn test_resolution_discards_operation() {
        assert!(ConflictResolution::Remote.discards_operation());
        assert!(ConflictResolution::Skip.discards_operation());
        assert!(!ConflictResolution::Local.discards_operation());
        assert!(!ConflictResolution::Merge.discards_operation());
    }

    #[test]
    fn test_http_method_mapping() {
        assert_eq!(HttpMethod::Post.operation_kind(), Some(OperationKind::Create));
        assert_eq!(HttpMethod::Patch.operation_kind(), Some(OperationKind::Update));
        assert_eq!(HttpMethod::Delete.operation_kind(), Some(OperationKind::Delete));
        assert_eq!(HttpMethod::Get.operation_kind(), None);
    }

    #[test]
    fn test_action_entity_id_prefers_payload() {
        let a = action(HttpMethod::Put, "/api/products/42", json!({ "id": "p-7" }));
        let spec = a.to_operation_spec().unwrap();
        assert_eq!(spec.entity_id, "p-7");
        assert_eq!(spec.kind, OperationKind::Update);
        assert_eq!(spec.entity_type, "product");
    }

    #[test]
    fn test_action_entity_id_from_endpoint() {
        let a = action(HttpMethod::Delete, "/api/products/42/", json!(null));
        let spec = a.to_operation_spec().unwrap();
        assert_eq!(spec.entity_id, "42");
        assert_eq!(spec.kind, OperationKind::Delete);
    }

    #[test]
    fn test_get_action_is_not_replayed() {
        let a = action(HttpMethod::Get, "/api/products/42", json!(null));
        assert!(a.to_operation_spec().is_none());
    }

    #[test]
    fn test_operation_persists_camel_case() {
        let op = SyncOperation {
            id: "op-1".to_string(),
            kind: OperationKind::Create,
            entity_type: "inventory".to_string(),
            entity_id: "i-1".to_string(),
            payload: Payload::new(json!({ "qty": 5 })),
            created_at: Utc::now(),
            retry_count: 0,
            max_retries: 3,
            priority: Priority::High,
            sequence: 1,
            last_error: None,
        };

        let value = serde_json::to_value(&op).unwrap();
        assert!(value.get("entityType").is_some());
        assert!(value.get("retryCount").is_some());
        assert_eq!(value["payload"]["qty"], 5);
    }
}
