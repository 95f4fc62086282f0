//! Error types for the offline cache
//!
//! Provides unified error handling using thiserror. None of these errors are
//! surfaced by the cache's read and write paths, which fail open; they travel
//! between the storage, remote store and scheduler layers.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the offline cache and sync engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Storage backend rejected a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem failure in a file-backed storage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted state was written by an unknown format version
    #[error("Unsupported format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version tag found in storage
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// Remote record store failed to answer
    #[error("Remote error: {0}")]
    Remote(String),
}

impl CacheError {
    /// Wraps any displayable remote failure.
    pub fn remote(err: impl std::fmt::Display) -> Self {
        Self::Remote(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the offline cache.
pub type Result<T> = std::result::Result<T, CacheError>;
