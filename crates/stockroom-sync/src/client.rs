//! # Remote API Client
//!
//! The boundary the engine dispatches operations through.
//!
//! ## Dispatch Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  dispatch(&SyncOperation) ──► DispatchResult                            │
//! │                                                                         │
//! │  { "outcome": "success" }                                               │
//! │      → operation completed                                              │
//! │                                                                         │
//! │  { "outcome": "conflict", "kind", "localData", "remoteData" }           │
//! │      → conflict recorded, operation blocked until resolved              │
//! │                                                                         │
//! │  { "outcome": "failure", "retryable": true,  "message" }                │
//! │      → retry budget consumed, retried on a later batch                  │
//! │                                                                         │
//! │  { "outcome": "failure", "retryable": false, "message" }                │
//! │      → operation moved straight to the failed set                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timeouts and transport errors are the client's concern. It reports them
//! as retryable failures; the engine never sees a raw network error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stockroom_core::{ConflictKind, Payload, SyncOperation};

/// Result of one remote dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchResult {
    Success,

    #[serde(rename_all = "camelCase")]
    Conflict {
        kind: ConflictKind,
        #[serde(default)]
        local_data: Payload,
        #[serde(default)]
        remote_data: Payload,
    },

    Failure { retryable: bool, message: String },
}

impl DispatchResult {
    pub fn retryable(message: impl Into<String>) -> Self {
        DispatchResult::Failure {
            retryable: true,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        DispatchResult::Failure {
            retryable: false,
            message: message.into(),
        }
    }
}

/// Performs the remote call for a queued operation.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn dispatch(&self, operation: &SyncOperation) -> DispatchResult;
}

/// A client with no network: every dispatch is a retryable failure.
///
/// Used when the engine is opened only to inspect persisted state.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

#[async_trait]
impl RemoteClient for OfflineClient {
    async fn dispatch(&self, _operation: &SyncOperation) -> DispatchResult {
        DispatchResult::retryable("remote client unavailable")
    }
}
