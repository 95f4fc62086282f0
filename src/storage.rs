//! Storage Module
//!
//! Key-value persistence the cache and sync config are written to. The host
//! supplies one of these; the crate ships an in-memory map and a directory of
//! files.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Version tag written alongside every persisted document.
pub const FORMAT_VERSION: u32 = 1;

/// Host persistent key-value storage.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Returns the stored text for `key`, or None if absent.
    fn load(&self, key: &str) -> Result<Option<String>>;
    /// Replaces the text stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<()>;
    /// Removes `key`; absent keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

// == Versioned Envelope ==
#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    body: T,
}

/// Serializes `body` inside a versioned envelope.
pub fn encode_versioned<T: Serialize>(body: &T) -> Result<String> {
    Ok(serde_json::to_string(&EnvelopeRef {
        version: FORMAT_VERSION,
        body,
    })?)
}

/// Parses a versioned envelope, rejecting versions this build does not know.
pub fn decode_versioned<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let envelope: Envelope<serde_json::Value> = serde_json::from_str(raw)?;
    if envelope.version != FORMAT_VERSION {
        return Err(CacheError::UnsupportedVersion {
            found: envelope.version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(serde_json::from_value(envelope.body)?)
}

// == Memory Storage ==
/// Storage held in process memory. Lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

// == File Storage ==
/// Storage with one JSON file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates if needed) the storage directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
