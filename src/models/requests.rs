//! Request DTOs for the caller-facing API
//!
//! Defines partial updates callers submit to the engine.

use serde::Deserialize;

use crate::sync::ConflictResolution;

/// Partial update of the sync configuration.
///
/// # Fields
/// Every field is optional; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfigUpdate {
    /// Maximum tables reconciled per tick
    pub batch_size: Option<usize>,
    /// Timer period in milliseconds
    pub sync_interval_ms: Option<u64>,
    /// Reconcile higher-priority tables first
    pub priority_based_sync: Option<bool>,
    /// Conflict policy to record
    pub conflict_resolution: Option<ConflictResolution>,
}

impl SyncConfigUpdate {
    /// True when the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.batch_size.is_none()
            && self.sync_interval_ms.is_none()
            && self.priority_based_sync.is_none()
            && self.conflict_resolution.is_none()
    }
}
