//! Sync configuration and its persistence.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::SyncConfigUpdate;
use crate::storage::{decode_versioned, encode_versioned, Storage};

/// Storage key holding the sync configuration.
pub const SYNC_CONFIG_KEY: &str = "offline_sync.sync_config";

/// Shortest timer period the scheduler will install.
pub const MIN_SYNC_INTERVAL_MS: u64 = 100;

/// How the remote copy and the local copy are reconciled.
///
/// Recorded for the host's benefit only: every re-admission is a table-wide
/// replacement with the remote data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    Client,
    Server,
    Merge,
}

/// Process-wide sync settings, read once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of tables reconciled per tick.
    pub batch_size: usize,
    /// Timer period in milliseconds.
    pub sync_interval_ms: u64,
    /// Reconcile higher-priority tables first.
    pub priority_based_sync: bool,
    /// Conflict policy, currently inert.
    pub conflict_resolution: ConflictResolution,
}

impl SyncConfig {
    /// Timer period, floored at [`MIN_SYNC_INTERVAL_MS`].
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.max(MIN_SYNC_INTERVAL_MS))
    }

    /// Applies the fields present in `update`.
    pub fn apply(&mut self, update: &SyncConfigUpdate) {
        if let Some(batch_size) = update.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(interval) = update.sync_interval_ms {
            self.sync_interval_ms = interval;
        }
        if let Some(priority_based) = update.priority_based_sync {
            self.priority_based_sync = priority_based;
        }
        if let Some(resolution) = update.conflict_resolution {
            self.conflict_resolution = resolution;
        }
    }

    /// Reads the persisted config, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load(storage: &dyn Storage) -> Self {
        match storage.load(SYNC_CONFIG_KEY) {
            Ok(Some(raw)) => decode_versioned(&raw).unwrap_or_else(|e| {
                warn!("Sync config unreadable, using defaults: {}", e);
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Sync config read failed, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Persists the config. Failures are logged and dropped.
    pub fn save(&self, storage: &dyn Storage) {
        let result = encode_versioned(self).and_then(|raw| storage.save(SYNC_CONFIG_KEY, &raw));
        if let Err(e) = result {
            warn!("Sync config write dropped: {}", e);
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            sync_interval_ms: 30_000,
            priority_based_sync: true,
            conflict_resolution: ConflictResolution::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert!(config.priority_based_sync);
        assert_eq!(config.conflict_resolution, ConflictResolution::Server);
    }

    #[test]
    fn test_sync_config_partial_update() {
        let mut config = SyncConfig::default();
        config.apply(&SyncConfigUpdate {
            batch_size: Some(5),
            conflict_resolution: Some(ConflictResolution::Merge),
            ..SyncConfigUpdate::default()
        });

        assert_eq!(config.batch_size, 5);
        assert_eq!(config.sync_interval_ms, 30_000);
        assert_eq!(config.conflict_resolution, ConflictResolution::Merge);
    }

    #[test]
    fn test_sync_interval_is_floored() {
        let config = SyncConfig {
            sync_interval_ms: 0,
            ..SyncConfig::default()
        };
        assert_eq!(config.sync_interval(), Duration::from_millis(MIN_SYNC_INTERVAL_MS));
    }

    #[test]
    fn test_sync_config_persists() {
        let storage = MemoryStorage::new();
        assert_eq!(SyncConfig::load(&storage), SyncConfig::default());

        let config = SyncConfig {
            batch_size: 3,
            ..SyncConfig::default()
        };
        config.save(&storage);

        assert_eq!(SyncConfig::load(&storage), config);
    }

    #[test]
    fn test_malformed_sync_config_falls_back() {
        let storage = MemoryStorage::new();
        storage.save(SYNC_CONFIG_KEY, "{\"version\":1,\"body\":{\"batch_size\":\"many\"}}").unwrap();
        assert_eq!(SyncConfig::load(&storage), SyncConfig::default());

        storage.save(SYNC_CONFIG_KEY, "garbage").unwrap();
        assert_eq!(SyncConfig::load(&storage), SyncConfig::default());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let storage = MemoryStorage::new();
        storage.save(SYNC_CONFIG_KEY, "{\"version\":1,\"body\":{\"batch_size\":7}}").unwrap();

        let config = SyncConfig::load(&storage);
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.sync_interval_ms, 30_000);
    }
}
