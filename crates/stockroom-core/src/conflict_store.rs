//! # Conflict Store
//!
//! Records conflicts surfaced by dispatch and tracks their resolution.
//!
//! ## Lifecycle
//! ```text
//! record()                    resolve()                     purge
//!    │                           │                            │
//!    ▼                           ▼                            ▼
//! ┌────────────┐  decision  ┌────────────┐  detected > N  ┌────────┐
//! │ unresolved │ ─────────► │  resolved  │ ─────────────► │  gone  │
//! └────────────┘            └────────────┘    days ago    └────────┘
//!
//! unresolved counter  +1 on record, -1 on resolve (floored at 0)
//! resolved counter    +1 on resolve, never decremented
//! ```
//!
//! Resolution is final: a second decision on the same conflict is rejected.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{ConflictResolution, ConflictSpec, SyncConflict};

#[derive(Debug, Clone, Default)]
pub struct ConflictStore {
    conflicts: Vec<SyncConflict>,
    unresolved: u64,
    resolved_total: u64,
}

impl ConflictStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the store from persisted conflicts.
    ///
    /// The unresolved count is re-derived from the list. `resolved_total`
    /// comes from the persisted stats since purged conflicts still count.
    pub fn from_conflicts(conflicts: Vec<SyncConflict>, resolved_total: u64) -> Self {
        let unresolved = conflicts.iter().filter(|c| !c.is_resolved()).count() as u64;
        let resolved_in_list = conflicts.len() as u64 - unresolved;

        ConflictStore {
            conflicts,
            unresolved,
            resolved_total: resolved_total.max(resolved_in_list),
        }
    }

    /// Stores a new unresolved conflict. Returns its id.
    pub fn record(&mut self, spec: ConflictSpec, now: DateTime<Utc>) -> String {
        let conflict = SyncConflict {
            id: Uuid::new_v4().to_string(),
            operation_id: spec.operation_id,
            kind: spec.kind,
            local_data: spec.local_data,
            remote_data: spec.remote_data,
            detected_at: now,
            resolution: None,
            resolved_at: None,
        };
        let id = conflict.id.clone();

        self.conflicts.push(conflict);
        self.unresolved += 1;

        id
    }

    /// Records a decision. Returns the resolved conflict.
    pub fn resolve(
        &mut self,
        id: &str,
        resolution: ConflictResolution,
        now: DateTime<Utc>,
    ) -> CoreResult<SyncConflict> {
        let conflict = self
            .conflicts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::ConflictNotFound(id.to_string()))?;

        if let Some(existing) = conflict.resolution {
            return Err(CoreError::ConflictAlreadyResolved {
                id: id.to_string(),
                resolution: existing.to_string(),
            });
        }

        conflict.resolution = Some(resolution);
        conflict.resolved_at = Some(now);
        let resolved = conflict.clone();

        self.unresolved = self.unresolved.saturating_sub(1);
        self.resolved_total += 1;

        Ok(resolved)
    }

    /// Drops resolved conflicts detected before `cutoff`.
    ///
    /// Unresolved conflicts are kept regardless of age.
    pub fn purge_resolved_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.conflicts.len();
        self.conflicts
            .retain(|c| !(c.is_resolved() && c.detected_at < cutoff));
        before - self.conflicts.len()
    }

    pub fn get(&self, id: &str) -> Option<&SyncConflict> {
        self.conflicts.iter().find(|c| c.id == id)
    }

    /// Every stored conflict, oldest first.
    pub fn all(&self) -> &[SyncConflict] {
        &self.conflicts
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &SyncConflict> {
        self.conflicts.iter().filter(|c| !c.is_resolved())
    }

    /// True when an unresolved conflict blocks this operation.
    pub fn has_unresolved_for(&self, operation_id: &str) -> bool {
        self.unresolved().any(|c| c.operation_id == operation_id)
    }

    pub fn unresolved_count(&self) -> u64 {
        self.unresolved
    }

    /// Lifetime number of resolutions, including purged conflicts.
    pub fn resolved_count(&self) -> u64 {
        self.resolved_total
    }
}
