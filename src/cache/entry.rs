//! Cache Entry Module
//!
//! Defines cached records, their priority, and the read-time sync state derived
//! from an entry's write and expiry timestamps.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

// == Priority ==
/// Caller-assigned importance of an entry.
///
/// Ordered `Low < Medium < High`; eviction drops the lowest first and the
/// scheduler reconciles the highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(label)
    }
}

// == Sync State ==
/// Age-derived classification of an entry. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Fresh,
    Stale,
    Expired,
}

impl SyncState {
    /// True for states the scheduler should reconcile.
    pub fn needs_sync(self) -> bool {
        matches!(self, SyncState::Stale | SyncState::Expired)
    }
}

// == Record ==
/// One record as known to the remote store: its key and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier of the record in its table
    pub key: String,
    /// Opaque payload bytes
    #[serde(serialize_with = "encode_payload", deserialize_with = "decode_payload")]
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Builds a record whose payload is the JSON encoding of `value`.
    pub fn from_json<T: Serialize>(key: impl Into<String>, value: &T) -> serde_json::Result<Self> {
        Ok(Self::new(key, serde_json::to_vec(value)?))
    }

    /// Decodes the payload as JSON into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.payload)
    }
}

fn encode_payload<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(payload))
}

fn decode_payload<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

// == Cache Entry ==
/// A cached record plus its table tag, timestamps and priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `{table}_{record key}_{written_at}`
    pub id: String,
    /// Logical collection the record belongs to
    pub table: String,
    /// The cached record
    pub data: Record,
    /// Admission timestamp (Unix milliseconds)
    pub written_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Caller-assigned priority
    pub priority: Priority,
}

impl CacheEntry {
    // == Constructor ==
    /// Stamps a record for admission at `now` with the given TTL.
    pub fn new(table: &str, data: Record, priority: Priority, ttl: Duration, now: u64) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self {
            id: format!("{}_{}_{}", table, data.key, now),
            table: table.to_string(),
            data,
            written_at: now,
            expires_at: now.saturating_add(ttl_ms),
            priority,
        }
    }

    /// TTL the entry was admitted with, in milliseconds.
    pub fn ttl_ms(&self) -> u64 {
        self.expires_at.saturating_sub(self.written_at)
    }

    // == Sync State ==
    /// Classifies the entry at `now`.
    ///
    /// Expired strictly after `expires_at`; stale once more than half the TTL
    /// has elapsed since `written_at`.
    pub fn sync_state(&self, now: u64) -> SyncState {
        if now > self.expires_at {
            SyncState::Expired
        } else if now.saturating_sub(self.written_at) > self.ttl_ms() / 2 {
            SyncState::Stale
        } else {
            SyncState::Fresh
        }
    }

    /// Remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}

// == Entry View ==
/// An entry as observed by a read, with its derived state.
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub id: String,
    pub key: String,
    pub priority: Priority,
    pub written_at: u64,
    pub expires_at: u64,
    pub sync_state: SyncState,
}

impl EntryView {
    pub(crate) fn observe(entry: &CacheEntry, now: u64) -> Self {
        Self {
            id: entry.id.clone(),
            key: entry.data.key.clone(),
            priority: entry.priority,
            written_at: entry.written_at,
            expires_at: entry.expires_at,
            sync_state: entry.sync_state(now),
        }
    }
}
