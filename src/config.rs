//! Configuration Module
//!
//! Handles loading the engine configuration from environment variables.
//! The persisted, caller-tunable sync settings live in [`crate::sync::SyncConfig`].

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::sync::PREFETCH_LIMIT;

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Default TTL in seconds for writes without explicit TTL
    pub default_ttl: u64,
    /// Maximum records fetched per table by a prefetch
    pub prefetch_limit: usize,
    /// Background prune task interval in seconds
    pub prune_interval: u64,
    /// Directory for file-backed storage, None = in-memory
    pub storage_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 500)
    /// - `DEFAULT_TTL_SECS` - Default TTL in seconds (default: 86400)
    /// - `PREFETCH_LIMIT` - Records per table on prefetch (default: 100)
    /// - `PRUNE_INTERVAL_SECS` - Prune frequency in seconds (default: 300)
    /// - `STORAGE_DIR` - Directory for persisted state (default: in-memory)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: parse_var("CACHE_CAPACITY").unwrap_or(defaults.capacity),
            default_ttl: parse_var("DEFAULT_TTL_SECS").unwrap_or(defaults.default_ttl),
            prefetch_limit: parse_var("PREFETCH_LIMIT").unwrap_or(defaults.prefetch_limit),
            prune_interval: parse_var("PRUNE_INTERVAL_SECS").unwrap_or(defaults.prune_interval),
            storage_dir: env::var("STORAGE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Default TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_ttl: DEFAULT_TTL.as_secs(),
            prefetch_limit: PREFETCH_LIMIT,
            prune_interval: 300,
            storage_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.capacity, 500);
        assert_eq!(config.default_ttl, 86_400);
        assert_eq!(config.prefetch_limit, 100);
        assert_eq!(config.prune_interval, 300);
        assert!(config.storage_dir.is_none());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("CACHE_CAPACITY");
        env::remove_var("DEFAULT_TTL_SECS");
        env::remove_var("PREFETCH_LIMIT");
        env::remove_var("PRUNE_INTERVAL_SECS");
        env::remove_var("STORAGE_DIR");

        let config = Config::from_env();
        assert_eq!(config.capacity, 500);
        assert_eq!(config.default_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.prefetch_limit, 100);
        assert!(config.storage_dir.is_none());
    }
}
