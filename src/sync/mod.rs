//! Sync Module
//!
//! Background reconciliation of the cache against the authoritative remote
//! store: persisted sync settings, per-table retry backoff, the remote and
//! connectivity seams, and the scheduler tying them together.

mod backoff;
mod config;
mod remote;
mod scheduler;

pub use backoff::{BackoffConfig, BackoffTracker};
pub use config::{ConflictResolution, SyncConfig, MIN_SYNC_INTERVAL_MS, SYNC_CONFIG_KEY};
pub use remote::{Connectivity, ConnectivityMonitor, RemoteStore};
pub use scheduler::{
    group_by_table, SchedulerOptions, SyncGroup, SyncReport, SyncScheduler, PREFETCH_LIMIT,
};
