//! Cache Module
//!
//! Provides the persisted offline record cache with TTL staleness and
//! priority-based eviction.

mod clock;
mod entry;
mod eviction;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, EntryView, Priority, Record, SyncState};
pub use eviction::enforce_capacity;
pub use stats::{CacheStats, PriorityCounts};
pub use store::{CacheStore, SharedCache, ENTRIES_KEY};

// == Public Constants ==
/// Maximum number of entries kept by default
pub const DEFAULT_CAPACITY: usize = 500;

/// TTL applied to writes that do not specify one
pub const DEFAULT_TTL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);
