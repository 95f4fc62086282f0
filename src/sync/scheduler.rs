//! Sync Scheduler
//!
//! Periodically reconciles stale and expired cache entries against the remote
//! store, and warms the cache on demand.
//!
//! # Tick
//! 1. Skip entirely while offline
//! 2. Collect stale and expired entries and group them by table
//! 3. Order groups by priority when priority-based sync is on
//! 4. Drop tables still backing off, keep at most `batch_size` groups
//! 5. Fetch each group's ids and re-admit the result at high priority
//!
//! Ticks never overlap: a tick that finds another in flight returns at once.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, Priority, Record, SharedCache};
use crate::error::CacheError;
use crate::models::SyncConfigUpdate;
use crate::storage::Storage;
use crate::sync::{BackoffConfig, BackoffTracker, Connectivity, RemoteStore, SyncConfig};

/// Records fetched per table by a prefetch unless configured otherwise.
pub const PREFETCH_LIMIT: usize = 100;

// == Options ==
/// Construction-time tuning of the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Records fetched per table by a prefetch
    pub prefetch_limit: usize,
    /// Retry curve for tables whose fetch failed
    pub backoff: BackoffConfig,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            prefetch_limit: PREFETCH_LIMIT,
            backoff: BackoffConfig::default(),
        }
    }
}

// == Sync Report ==
/// Outcome of one tick or prefetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Another tick was in flight; nothing was done
    pub skipped: bool,
    /// Connectivity reported offline; nothing was done
    pub offline: bool,
    /// Tables whose records were fetched and re-admitted
    pub synced: Vec<String>,
    /// Tables whose fetch failed
    pub failed: Vec<String>,
    /// Stale tables left out because they are backing off
    pub deferred: Vec<String>,
}

impl SyncReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }
}

// == Sync Group ==
/// Stale entries of one table, reconciled together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncGroup {
    pub table: String,
    /// Priority of the first entry of this table that was encountered
    pub priority: Priority,
    /// Record keys to refetch
    pub ids: Vec<String>,
}

/// Groups entries by table in encounter order.
///
/// A group takes the priority of its first entry, not the highest one among
/// its entries. Callers relying on mixed priorities within a table get the
/// first writer's ordering.
pub fn group_by_table(entries: Vec<CacheEntry>) -> Vec<SyncGroup> {
    let mut groups: Vec<SyncGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        match index.get(&entry.table) {
            Some(&i) => groups[i].ids.push(entry.data.key),
            None => {
                index.insert(entry.table.clone(), groups.len());
                groups.push(SyncGroup {
                    table: entry.table,
                    priority: entry.priority,
                    ids: vec![entry.data.key],
                });
            }
        }
    }
    groups
}

struct Timer {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    cache: SharedCache,
    storage: Arc<dyn Storage>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<dyn Connectivity>,
    config: Mutex<SyncConfig>,
    backoff: Mutex<BackoffTracker>,
    tick_lock: tokio::sync::Mutex<()>,
    timer: Mutex<Option<Timer>>,
    default_tables: Mutex<Vec<String>>,
    prefetch_limit: usize,
}

// == Sync Scheduler ==
/// Background reconciler of the cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("running", &self.is_running())
            .field("config", &self.config())
            .finish()
    }
}

impl SyncScheduler {
    // == Constructor ==
    /// Creates a stopped scheduler. The sync config is loaded from `storage`.
    pub fn new(
        cache: SharedCache,
        storage: Arc<dyn Storage>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<dyn Connectivity>,
        options: SchedulerOptions,
    ) -> Self {
        let config = SyncConfig::load(storage.as_ref());
        Self {
            inner: Arc::new(Inner {
                cache,
                storage,
                remote,
                connectivity,
                config: Mutex::new(config),
                backoff: Mutex::new(BackoffTracker::new(options.backoff)),
                tick_lock: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
                default_tables: Mutex::new(Vec::new()),
                prefetch_limit: options.prefetch_limit,
            }),
        }
    }

    // == Config ==
    /// Current sync configuration.
    pub fn config(&self) -> SyncConfig {
        self.inner.config.lock().clone()
    }

    /// Merges `update` into the configuration and persists it.
    ///
    /// The next tick picks it up; a new interval applies after the next
    /// [`start`](Self::start). An empty update is not persisted.
    pub fn update_config(&self, update: &SyncConfigUpdate) -> SyncConfig {
        let mut config = self.inner.config.lock();
        if update.is_empty() {
            debug!("Empty sync config update ignored");
            return config.clone();
        }
        config.apply(update);
        config.save(self.inner.storage.as_ref());
        info!("Sync config updated: {:?}", *config);
        config.clone()
    }

    // == Start ==
    /// Starts the recurring tick, replacing any timer already installed.
    ///
    /// `default_tables` are the tables prefetched when connectivity returns.
    /// Must be called inside a tokio runtime.
    pub fn start(&self, default_tables: Vec<String>) {
        let period = self.config().sync_interval();
        *self.inner.default_tables.lock() = default_tables;

        let mut timer = self.inner.timer.lock();
        if let Some(previous) = timer.take() {
            let _ = previous.stop_tx.send(true);
            debug!("Replacing running sync timer");
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_timer(Arc::downgrade(&self.inner), period, stop_rx));
        *timer = Some(Timer { stop_tx, handle });

        info!("Sync scheduler started with interval of {:?}", period);
    }

    // == Stop ==
    /// Prevents future ticks. A tick already running is left to finish.
    pub fn stop(&self) {
        if let Some(timer) = self.inner.timer.lock().take() {
            let _ = timer.stop_tx.send(true);
            info!("Sync scheduler stopped");
        }
    }

    /// Stops the timer and waits for its task, including any in-flight tick.
    pub async fn shutdown(&self) {
        let timer = self.inner.timer.lock().take();
        if let Some(timer) = timer {
            let _ = timer.stop_tx.send(true);
            if let Err(e) = timer.handle.await {
                warn!("Sync timer task ended abnormally: {}", e);
            }
            info!("Sync scheduler shut down");
        }
    }

    /// True while a timer is installed.
    pub fn is_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.handle.is_finished())
    }

    // == Tick ==
    /// Runs one reconciliation pass.
    pub async fn tick(&self) -> SyncReport {
        let Ok(_guard) = self.inner.tick_lock.try_lock() else {
            debug!("Sync tick already in flight, skipping");
            return SyncReport::skipped();
        };

        if !self.inner.connectivity.is_online() {
            debug!("Offline, skipping sync tick");
            return SyncReport::offline();
        }

        let config = self.config();
        let (candidates, now) = {
            let cache = self.inner.cache.read().await;
            (cache.sync_candidates(), cache.now_ms())
        };
        if candidates.is_empty() {
            debug!("Sync tick: nothing stale");
            return SyncReport::default();
        }

        let mut groups = group_by_table(candidates);
        if config.priority_based_sync {
            groups.sort_by(|a, b| b.priority.cmp(&a.priority));
        }

        let mut report = SyncReport::default();
        let mut selected = Vec::new();
        {
            let backoff = self.inner.backoff.lock();
            for group in groups {
                if backoff.is_blocked(&group.table, now) {
                    report.deferred.push(group.table);
                } else if selected.len() < config.batch_size {
                    selected.push(group);
                }
            }
        }

        for group in selected {
            match self
                .inner
                .remote
                .fetch_by_ids(&group.table, &group.ids)
                .await
            {
                Ok(records) => {
                    debug!(
                        "Synced table '{}': {} stale ids, {} records returned",
                        group.table,
                        group.ids.len(),
                        records.len()
                    );
                    self.admit(&group.table, records).await;
                    report.synced.push(group.table);
                }
                Err(e) => {
                    self.fail(&group.table, &e).await;
                    report.failed.push(group.table);
                }
            }
        }

        info!(
            "Sync tick: {} synced, {} failed, {} backing off",
            report.synced.len(),
            report.failed.len(),
            report.deferred.len()
        );
        report
    }

    // == Prefetch ==
    /// Fetches the first records of each table and caches them at high
    /// priority. Does nothing while offline.
    pub async fn prefetch(&self, tables: &[String]) -> SyncReport {
        if !self.inner.connectivity.is_online() {
            debug!("Offline, skipping prefetch");
            return SyncReport::offline();
        }

        let mut report = SyncReport::default();
        for table in tables {
            match self
                .inner
                .remote
                .fetch_first_n(table, self.inner.prefetch_limit)
                .await
            {
                Ok(records) => {
                    debug!("Prefetched {} records for table '{}'", records.len(), table);
                    self.admit(table, records).await;
                    report.synced.push(table.clone());
                }
                Err(e) => {
                    self.fail(table, &e).await;
                    report.failed.push(table.clone());
                }
            }
        }

        info!(
            "Prefetch: {} tables cached, {} failed",
            report.synced.len(),
            report.failed.len()
        );
        report
    }

    // == Reconnect Watch ==
    /// Spawns a task that prefetches the default tables each time
    /// connectivity goes from offline to online.
    ///
    /// The task ends when the connectivity source or the scheduler is dropped.
    pub fn watch_connectivity(&self) -> JoinHandle<()> {
        let mut rx = self.inner.connectivity.subscribe();
        let inner = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut was_online = *rx.borrow_and_update();
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if online && !was_online {
                    let Some(inner) = inner.upgrade() else { break };
                    let scheduler = SyncScheduler { inner };
                    let tables = scheduler.inner.default_tables.lock().clone();
                    info!("Back online, prefetching {} tables", tables.len());
                    scheduler.prefetch(&tables).await;
                }
                was_online = online;
            }
            debug!("Connectivity watch ended");
        })
    }

    /// Consecutive fetch failures recorded for `table`.
    pub fn failures(&self, table: &str) -> u32 {
        self.inner.backoff.lock().failures(table)
    }

    async fn admit(&self, table: &str, records: Vec<Record>) {
        self.inner
            .cache
            .write()
            .await
            .put(table, records, Priority::High, None);
        self.inner.backoff.lock().record_success(table);
    }

    async fn fail(&self, table: &str, error: &CacheError) {
        let now = self.inner.cache.read().await.now_ms();
        let delay = self.inner.backoff.lock().record_failure(table, now);
        warn!(
            "Sync of table '{}' failed, retrying in {:?}: {}",
            table, delay, error
        );
    }
}

async fn run_timer(inner: Weak<Inner>, period: Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop_rx.changed() => break,
        }
        if *stop_rx.borrow() {
            break;
        }
        let Some(inner) = inner.upgrade() else { break };
        SyncScheduler { inner }.tick().await;
    }
    debug!("Sync timer exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(table: &str, key: &str, priority: Priority) -> CacheEntry {
        CacheEntry::new(
            table,
            Record::new(key, Vec::new()),
            priority,
            Duration::from_secs(60),
            0,
        )
    }

    #[test]
    fn test_groups_keep_encounter_order() {
        let groups = group_by_table(vec![
            entry("b", "1", Priority::Low),
            entry("a", "2", Priority::Medium),
            entry("b", "3", Priority::High),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].table, "b");
        assert_eq!(groups[0].ids, vec!["1", "3"]);
        assert_eq!(groups[1].table, "a");
    }

    #[test]
    fn test_group_priority_comes_from_first_entry() {
        let groups = group_by_table(vec![
            entry("t", "1", Priority::Low),
            entry("t", "2", Priority::High),
        ]);

        assert_eq!(groups[0].priority, Priority::Low);
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        assert!(group_by_table(Vec::new()).is_empty());
    }
}
