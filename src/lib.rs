//! Offline Sync - An offline record cache with background reconciliation
//!
//! Keeps table records usable while disconnected, classifies them as fresh,
//! stale or expired by age, evicts by priority at capacity, and refreshes
//! stale tables from the remote store when online.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;
pub mod sync;
pub mod tasks;

pub use cache::{CacheStore, Priority, Record, SharedCache, SyncState};
pub use config::Config;
pub use engine::OfflineEngine;
pub use error::{CacheError, Result};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use sync::{Connectivity, ConnectivityMonitor, RemoteStore, SyncConfig, SyncScheduler};
pub use tasks::spawn_prune_task;
