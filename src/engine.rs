//! Engine Module
//!
//! Single owner of the shared cache and its sync scheduler, exposing the
//! caller-facing API.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::{CacheStats, CacheStore, EntryView, Priority, Record, SharedCache};
use crate::config::Config;
use crate::error::Result;
use crate::models::{HealthReport, SyncConfigUpdate};
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::sync::{Connectivity, RemoteStore, SchedulerOptions, SyncConfig, SyncReport, SyncScheduler};
use crate::tasks::spawn_prune_task;

/// Offline cache plus background sync, shared across tasks.
///
/// Cloning yields another handle to the same cache and scheduler.
#[derive(Debug, Clone)]
pub struct OfflineEngine {
    /// Shared cache store
    pub cache: SharedCache,
    /// Background reconciler
    pub scheduler: SyncScheduler,
    /// Seconds between expiry prunes
    prune_interval: u64,
}

impl OfflineEngine {
    /// Creates an engine over an existing store and scheduler.
    pub fn new(cache: SharedCache, scheduler: SyncScheduler) -> Self {
        Self {
            cache,
            scheduler,
            prune_interval: Config::default().prune_interval,
        }
    }

    /// Creates an engine from configuration.
    ///
    /// Opens file storage when `storage_dir` is set, in-memory storage
    /// otherwise. Fails only if the storage directory cannot be created.
    pub fn from_config(
        config: &Config,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Result<Self> {
        let storage: Arc<dyn Storage> = match &config.storage_dir {
            Some(dir) => Arc::new(FileStorage::open(dir)?),
            None => Arc::new(MemoryStorage::new()),
        };
        let cache = CacheStore::new(storage.clone(), config.capacity, config.default_ttl())
            .into_shared();
        let options = SchedulerOptions {
            prefetch_limit: config.prefetch_limit,
            ..SchedulerOptions::default()
        };
        let scheduler = SyncScheduler::new(cache.clone(), storage, remote, connectivity, options);

        info!(
            "Offline engine ready: capacity={}, default_ttl={}s, storage={}",
            config.capacity,
            config.default_ttl,
            config
                .storage_dir
                .as_ref()
                .map_or_else(|| "memory".to_string(), |d| d.display().to_string())
        );

        Ok(Self {
            cache,
            scheduler,
            prune_interval: config.prune_interval,
        })
    }

    // == Cache ==
    /// Replaces the cached records of `table`. See [`CacheStore::put`].
    pub async fn put(
        &self,
        table: &str,
        records: Vec<Record>,
        priority: Priority,
        ttl: Option<Duration>,
    ) -> usize {
        self.cache.write().await.put(table, records, priority, ttl)
    }

    /// Reads the cached records of `table`. See [`CacheStore::get`].
    pub async fn get(&self, table: &str, include_stale: bool) -> Vec<Record> {
        self.cache.read().await.get(table, include_stale)
    }

    pub async fn entries(&self, table: &str) -> Vec<EntryView> {
        self.cache.read().await.entries(table)
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    /// Statistics plus a display score.
    pub async fn health(&self) -> HealthReport {
        HealthReport::new(self.stats().await, self.scheduler.is_running())
    }

    pub async fn prune_expired(&self) -> usize {
        self.cache.write().await.prune_expired()
    }

    /// Spawns the periodic expiry prune. The caller aborts the handle on
    /// shutdown.
    pub fn spawn_prune_task(&self) -> JoinHandle<()> {
        spawn_prune_task(self.cache.clone(), self.prune_interval)
    }

    // == Sync ==
    pub fn start(&self, default_tables: Vec<String>) {
        self.scheduler.start(default_tables);
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub async fn prefetch(&self, tables: &[String]) -> SyncReport {
        self.scheduler.prefetch(tables).await
    }

    pub fn update_config(&self, update: &SyncConfigUpdate) -> SyncConfig {
        self.scheduler.update_config(update)
    }

    pub fn config(&self) -> SyncConfig {
        self.scheduler.config()
    }
}
