//! Background Tasks Module
//!
//! Contains maintenance tasks that run periodically alongside the scheduler.
//!
//! # Tasks
//! - Expiry prune: removes expired cache entries at configured intervals

mod cleanup;

pub use cleanup::{spawn_prune_task, MIN_PRUNE_INTERVAL_SECS};
