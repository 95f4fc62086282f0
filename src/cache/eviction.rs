//! Priority Eviction Module
//!
//! Capacity enforcement for the persisted entry collection.

use crate::cache::CacheEntry;

// == Enforce Capacity ==
/// Orders entries by priority and keeps at most `capacity` of them.
///
/// Entries are always stable-sorted by priority, descending, so the stored
/// collection stays priority-ordered. When over capacity the tail is cut.
/// Within one priority the existing order is kept, so entries appended by the
/// latest write are the first of their priority to go. Returns the number of
/// entries dropped.
pub fn enforce_capacity(entries: &mut Vec<CacheEntry>, capacity: usize) -> usize {
    entries.sort_by(|a, b| b.priority.cmp(&a.priority));
    if entries.len() <= capacity {
        return 0;
    }
    let evicted = entries.len() - capacity;
    entries.truncate(capacity);
    evicted
}
