//! Cache Store Module
//!
//! Persisted record cache with table-wide replacement, read-time staleness and
//! priority-based capacity enforcement.
//!
//! Every operation reads the whole collection from [`Storage`], and writes
//! persist it back in full. Callers share the store as a [`SharedCache`] so the
//! read-modify-write of one write cannot interleave with another.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{
    enforce_capacity, CacheEntry, CacheStats, Clock, EntryView, Priority, Record, SyncState,
    SystemClock,
};
use crate::error::Result;
use crate::storage::{decode_versioned, encode_versioned, Storage};

/// Storage key holding the entry collection.
pub const ENTRIES_KEY: &str = "offline_sync.entries";

/// Cache store shared between callers and the sync scheduler.
pub type SharedCache = Arc<RwLock<CacheStore>>;

// == Cache Store ==
/// Persisted cache of table records.
#[derive(Debug)]
pub struct CacheStore {
    /// Backing key-value storage
    storage: Arc<dyn Storage>,
    /// Time source for stamping and classification
    clock: Arc<dyn Clock>,
    /// Maximum number of entries kept
    capacity: usize,
    /// TTL for writes without an explicit one
    default_ttl: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store over `storage` using the system clock.
    ///
    /// # Arguments
    /// * `storage` - Where the entry collection is persisted
    /// * `capacity` - Maximum number of entries the cache can hold
    /// * `default_ttl` - TTL applied when `put` is given none
    pub fn new(storage: Arc<dyn Storage>, capacity: usize, default_ttl: Duration) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            capacity,
            default_ttl,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wraps the store for sharing across tasks.
    pub fn into_shared(self) -> SharedCache {
        Arc::new(RwLock::new(self))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current time according to the store's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // == Put ==
    /// Replaces every entry of `table` with `records`.
    ///
    /// All prior entries of the table are dropped, whatever their state. After
    /// admission the whole store is cut back to capacity, which can evict other
    /// tables' lower-priority entries. A storage failure drops the write.
    ///
    /// Returns the number of entries evicted for capacity.
    pub fn put(
        &mut self,
        table: &str,
        records: Vec<Record>,
        priority: Priority,
        ttl: Option<Duration>,
    ) -> usize {
        let now = self.clock.now_ms();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let admitted = records.len();

        let mut entries = self.load();
        entries.retain(|entry| entry.table != table);
        entries.extend(
            records
                .into_iter()
                .map(|record| CacheEntry::new(table, record, priority, ttl, now)),
        );

        let evicted = enforce_capacity(&mut entries, self.capacity);
        if evicted > 0 {
            info!(
                "Capacity reached: evicted {} entries while admitting table '{}'",
                evicted, table
            );
        }

        if self.persist(&entries) {
            debug!(
                "Cached {} records for table '{}' at {} priority",
                admitted, table, priority
            );
        }
        evicted
    }

    // == Get ==
    /// Returns the records cached for `table`.
    ///
    /// Stale records are always included. Expired ones are included only when
    /// `include_stale` is true.
    pub fn get(&self, table: &str, include_stale: bool) -> Vec<Record> {
        let now = self.clock.now_ms();
        self.load()
            .into_iter()
            .filter(|entry| entry.table == table)
            .filter(|entry| include_stale || entry.sync_state(now) != SyncState::Expired)
            .map(|entry| entry.data)
            .collect()
    }

    // == Entries ==
    /// Returns the entries of `table` with their state at this instant.
    pub fn entries(&self, table: &str) -> Vec<EntryView> {
        let now = self.clock.now_ms();
        self.load()
            .iter()
            .filter(|entry| entry.table == table)
            .map(|entry| EntryView::observe(entry, now))
            .collect()
    }

    // == Stats ==
    /// Scans the whole store and returns its current statistics.
    pub fn stats(&self) -> CacheStats {
        let (entries, byte_size) = match self.load_raw() {
            Some(raw) => match self.try_decode(&raw) {
                Some(entries) => (entries, raw.len()),
                None => (Vec::new(), 0),
            },
            None => (Vec::new(), 0),
        };
        CacheStats::collect(&entries, self.clock.now_ms(), byte_size)
    }

    // == Prune Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed, or 0 if the result could not be
    /// persisted.
    pub fn prune_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|entry| entry.sync_state(now) != SyncState::Expired);

        let removed = before - entries.len();
        if removed == 0 || !self.persist(&entries) {
            return 0;
        }
        removed
    }

    // == Sync Candidates ==
    /// Returns every stale or expired entry, in stored order.
    pub fn sync_candidates(&self) -> Vec<CacheEntry> {
        let now = self.clock.now_ms();
        self.load()
            .into_iter()
            .filter(|entry| entry.sync_state(now).needs_sync())
            .collect()
    }

    // == Length ==
    /// Returns the number of persisted entries.
    pub fn len(&self) -> usize {
        self.load().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Persistence ==
    fn load_raw(&self) -> Option<String> {
        match self.storage.load(ENTRIES_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cache read failed, treating store as empty: {}", e);
                None
            }
        }
    }

    fn try_decode(&self, raw: &str) -> Option<Vec<CacheEntry>> {
        match decode_versioned(raw) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("Cache contents unreadable, treating store as empty: {}", e);
                None
            }
        }
    }

    fn load(&self) -> Vec<CacheEntry> {
        self.load_raw()
            .and_then(|raw| self.try_decode(&raw))
            .unwrap_or_default()
    }

    fn try_persist(&self, entries: &[CacheEntry]) -> Result<()> {
        let raw = encode_versioned(&entries)?;
        self.storage.save(ENTRIES_KEY, &raw)
    }

    fn persist(&self, entries: &[CacheEntry]) -> bool {
        match self.try_persist(entries) {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache write dropped: {}", e);
                false
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::CacheError;
    use crate::storage::MemoryStorage;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn new_store(capacity: usize) -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = CacheStore::new(Arc::new(MemoryStorage::new()), capacity, DAY)
            .with_clock(clock.clone());
        (store, clock)
    }

    fn records(keys: &[&str]) -> Vec<Record> {
        keys.iter()
            .map(|k| Record::new(*k, k.as_bytes().to_vec()))
            .collect()
    }

    fn keys(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.key.clone()).collect()
    }

    #[derive(Debug)]
    struct FailingStorage;

    impl Storage for FailingStorage {
        fn load(&self, _key: &str) -> Result<Option<String>> {
            Err(CacheError::Storage("quota exceeded".to_string()))
        }
        fn save(&self, _key: &str, _value: &str) -> Result<()> {
            Err(CacheError::Storage("quota exceeded".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_store_new() {
        let (store, _) = new_store(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 100);
    }

    #[test]
    fn test_store_put_and_get() {
        let (mut store, _) = new_store(100);

        store.put("users", records(&["a", "b"]), Priority::Medium, None);

        assert_eq!(keys(&store.get("users", true)), vec!["a", "b"]);
        assert!(store.get("orders", true).is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_put_replaces_table() {
        let (mut store, _) = new_store(100);

        store.put("t", records(&["a", "b", "c"]), Priority::Low, None);
        store.put("other", records(&["z"]), Priority::Low, None);
        store.put("t", records(&["x"]), Priority::High, None);

        assert_eq!(keys(&store.get("t", true)), vec!["x"]);
        assert_eq!(keys(&store.get("other", true)), vec!["z"]);
    }

    #[test]
    fn test_store_put_empty_clears_table() {
        let (mut store, _) = new_store(100);

        store.put("t", records(&["a"]), Priority::Low, None);
        store.put("t", Vec::new(), Priority::Low, None);

        assert!(store.get("t", true).is_empty());
    }

    #[test]
    fn test_store_entry_ids_include_write_time() {
        let (mut store, clock) = new_store(100);

        store.put("t", records(&["a"]), Priority::Low, None);
        let first = store.entries("t")[0].id.clone();
        clock.advance(Duration::from_millis(5));
        store.put("t", records(&["a"]), Priority::Low, None);
        let second = store.entries("t")[0].id.clone();

        assert_eq!(first, "t_a_1000000");
        assert_eq!(second, "t_a_1000005");
    }

    #[test]
    fn test_store_get_excludes_expired_only() {
        let (mut store, clock) = new_store(100);

        store.put("short", records(&["s"]), Priority::Low, Some(Duration::from_secs(10)));
        store.put("long", records(&["l"]), Priority::Low, Some(Duration::from_secs(100)));

        // short is expired, long is stale
        clock.advance(Duration::from_secs(60));

        assert!(store.get("short", false).is_empty());
        assert_eq!(store.get("short", true).len(), 1);
        assert_eq!(store.get("long", false).len(), 1);
        assert_eq!(store.entries("long")[0].sync_state, SyncState::Stale);
    }

    #[test]
    fn test_store_staleness_scenario() {
        let (mut store, clock) = new_store(100);

        store.put("t", records(&["a", "b", "c"]), Priority::Medium, None);

        clock.advance(Duration::from_secs(12 * 3600 + 1));
        assert!(store
            .entries("t")
            .iter()
            .all(|e| e.sync_state == SyncState::Stale));

        clock.advance(Duration::from_secs(12 * 3600));
        assert_eq!(store.prune_expired(), 3);
        assert_eq!(store.prune_expired(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_prune_keeps_live_entries() {
        let (mut store, clock) = new_store(100);

        store.put("a", records(&["1"]), Priority::Low, Some(Duration::from_secs(1)));
        store.put("b", records(&["2"]), Priority::Low, Some(Duration::from_secs(10)));

        clock.advance(Duration::from_millis(1_100));

        assert_eq!(store.prune_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("b", false).len(), 1);
    }

    #[test]
    fn test_store_capacity_evicts_across_tables() {
        let (mut store, _) = new_store(4);

        store.put("low", records(&["1", "2", "3"]), Priority::Low, None);
        let evicted = store.put("high", records(&["a", "b", "c"]), Priority::High, None);

        assert_eq!(evicted, 2);
        assert_eq!(store.len(), 4);
        assert_eq!(store.get("high", true).len(), 3);
        assert_eq!(store.get("low", true).len(), 1);
    }

    #[test]
    fn test_store_capacity_drops_new_low_priority_writes() {
        let (mut store, _) = new_store(2);

        store.put("high", records(&["a", "b"]), Priority::High, None);
        let evicted = store.put("low", records(&["x"]), Priority::Low, None);

        assert_eq!(evicted, 1);
        assert!(store.get("low", true).is_empty());
        assert_eq!(store.get("high", true).len(), 2);
    }

    #[test]
    fn test_store_keeps_entries_in_priority_order() {
        let (mut store, clock) = new_store(500);

        store.put("low", records(&["1"]), Priority::Low, Some(Duration::from_secs(100)));
        store.put("medium", records(&["2"]), Priority::Medium, Some(Duration::from_secs(100)));
        store.put("high", records(&["3"]), Priority::High, Some(Duration::from_secs(100)));
        clock.advance(Duration::from_secs(60));

        let order: Vec<(String, Priority)> = store
            .sync_candidates()
            .into_iter()
            .map(|e| (e.table, e.priority))
            .collect();
        assert_eq!(
            order,
            vec![
                ("high".to_string(), Priority::High),
                ("medium".to_string(), Priority::Medium),
                ("low".to_string(), Priority::Low),
            ]
        );
    }

    #[test]
    fn test_store_stats() {
        let (mut store, clock) = new_store(100);

        store.put("a", records(&["1", "2"]), Priority::High, Some(Duration::from_secs(100)));
        clock.advance(Duration::from_secs(60));
        store.put("b", records(&["3"]), Priority::Low, Some(Duration::from_secs(100)));

        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.stale, 2);
        assert_eq!(stats.fresh, 1);
        assert_eq!(stats.by_priority.high, 2);
        assert_eq!(stats.by_priority.low, 1);
        assert!(stats.byte_size > 0);
        assert!(stats.oldest_written_at < stats.newest_written_at);
    }

    #[test]
    fn test_store_sync_candidates() {
        let (mut store, clock) = new_store(100);

        store.put("old", records(&["1"]), Priority::Low, Some(Duration::from_secs(100)));
        clock.advance(Duration::from_secs(80));
        store.put("new", records(&["2"]), Priority::Low, Some(Duration::from_secs(100)));

        let candidates = store.sync_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].table, "old");
    }

    #[test]
    fn test_store_fails_open_on_storage_errors() {
        let mut store = CacheStore::new(Arc::new(FailingStorage), 10, DAY);

        store.put("t", records(&["a"]), Priority::High, None);

        assert!(store.get("t", true).is_empty());
        assert_eq!(store.stats().total, 0);
        assert_eq!(store.prune_expired(), 0);
    }

    #[test]
    fn test_store_treats_corrupt_data_as_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.save(ENTRIES_KEY, "not json").unwrap();
        let mut store = CacheStore::new(storage.clone(), 10, DAY);

        assert!(store.is_empty());
        let stats = store.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.byte_size, 0);

        // The next write replaces the corrupt document
        store.put("t", records(&["a"]), Priority::Low, None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_persists_through_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut first = CacheStore::new(storage.clone(), 10, DAY);
        first.put("t", records(&["a"]), Priority::Medium, None);

        let second = CacheStore::new(storage, 10, DAY);
        assert_eq!(keys(&second.get("t", true)), vec!["a"]);
    }
}
