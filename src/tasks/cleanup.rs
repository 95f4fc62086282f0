//! Expiry Prune Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Shortest interval between prune runs, in seconds.
pub const MIN_PRUNE_INTERVAL_SECS: u64 = 1;

/// Spawns a background task that periodically prunes expired cache entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between runs. It takes the write lock only for the prune itself. Intervals
/// below [`MIN_PRUNE_INTERVAL_SECS`] are raised to it.
///
/// # Arguments
/// * `cache` - Shared handle to the cache store
/// * `prune_interval_secs` - Interval in seconds between prune runs
///
/// # Returns
/// A JoinHandle for the spawned task, which the owner aborts on shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_prune_task(cache.clone(), 300);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_prune_task(cache: SharedCache, prune_interval_secs: u64) -> JoinHandle<()> {
    let prune_interval_secs = prune_interval_secs.max(MIN_PRUNE_INTERVAL_SECS);
    let interval = Duration::from_secs(prune_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry prune task with interval of {} seconds",
            prune_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.write().await.prune_expired();

            if removed > 0 {
                info!("Expiry prune: removed {} expired entries", removed);
            } else {
                debug!("Expiry prune: no expired entries found");
            }
        }
    })
}
