//! Cache Statistics Module
//!
//! Aggregate health of the cached collection, computed by a full scan.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::cache::{CacheEntry, Priority, SyncState};

// == Priority Counts ==
/// Entry counts per priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

// == Cache Stats ==
/// Snapshot of the cache taken at one instant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of entries in the store
    pub total: usize,
    /// Entries younger than half their TTL
    pub fresh: usize,
    /// Entries past half their TTL but not expired
    pub stale: usize,
    /// Entries past their expiry
    pub expired: usize,
    /// Entry counts per priority
    pub by_priority: PriorityCounts,
    /// Serialized size of the whole persisted collection
    pub byte_size: usize,
    /// Earliest admission time, None when empty
    pub oldest_written_at: Option<DateTime<Utc>>,
    /// Latest admission time, None when empty
    pub newest_written_at: Option<DateTime<Utc>>,
}

impl CacheStats {
    // == Collect ==
    /// Scans `entries` and classifies each one at `now`.
    pub fn collect(entries: &[CacheEntry], now: u64, byte_size: usize) -> Self {
        let mut stats = Self {
            total: entries.len(),
            byte_size,
            ..Self::default()
        };

        let mut oldest: Option<u64> = None;
        let mut newest: Option<u64> = None;

        for entry in entries {
            match entry.sync_state(now) {
                SyncState::Fresh => stats.fresh += 1,
                SyncState::Stale => stats.stale += 1,
                SyncState::Expired => stats.expired += 1,
            }
            match entry.priority {
                Priority::High => stats.by_priority.high += 1,
                Priority::Medium => stats.by_priority.medium += 1,
                Priority::Low => stats.by_priority.low += 1,
            }
            oldest = Some(oldest.map_or(entry.written_at, |t| t.min(entry.written_at)));
            newest = Some(newest.map_or(entry.written_at, |t| t.max(entry.written_at)));
        }

        stats.oldest_written_at = oldest.and_then(to_datetime);
        stats.newest_written_at = newest.and_then(to_datetime);
        stats
    }

    // == Health Score ==
    /// Scores the cache from 0 (everything expired) to 100 (everything fresh).
    ///
    /// Fresh entries count fully, stale ones half, expired ones not at all.
    /// An empty cache has nothing out of date and scores 100.
    pub fn health_score(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let weighted = self.fresh * 100 + self.stale * 50;
        // fresh + stale <= total, so this never exceeds 100
        (weighted / self.total) as u8
    }
}

fn to_datetime(ms: u64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(i64::try_from(ms).ok()?).single()
}
