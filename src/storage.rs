//! Key-value storage for the durable log
//!
//! The durable log lives as one JSON array under [`STORAGE_KEY`]. It is read
//! once at startup and fully rewritten on every mutation. Two processes
//! sharing a directory race on that slot; the last writer wins.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::entry::LogEntry;
use crate::error::StorageError;

/// Fixed key holding the durable log
pub const STORAGE_KEY: &str = "static_site_logs";

/// Synchronous key-value storage. Any call may fail; callers treat failure as non-fatal.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        // Write then rename so a crash never leaves half an array behind
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
        Ok(())
    }
}

/// Read the durable log. Missing, unreadable or malformed data yields an empty log;
/// an array keeps every element that still reads as an entry.
pub fn load_entries(storage: &dyn Storage) -> Vec<LogEntry> {
    let raw = match storage.get(STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            log::warn!("Durable log unavailable, starting empty: {}", e);
            return Vec::new();
        }
    };

    let values = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
        Ok(values) => values,
        Err(e) => {
            log::warn!("Discarding malformed durable log: {}", e);
            return Vec::new();
        }
    };

    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<LogEntry>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable durable log entry {}: {}", index, e);
                None
            }
        })
        .collect()
}

/// Rewrite the durable log. Failures are logged and swallowed.
pub fn save_entries<'a>(storage: &dyn Storage, entries: impl IntoIterator<Item = &'a LogEntry>) {
    let entries: Vec<&LogEntry> = entries.into_iter().collect();
    let json = match serde_json::to_string(&entries) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Failed to encode durable log: {}", e);
            return;
        }
    };
    if let Err(e) = storage.set(STORAGE_KEY, &json) {
        log::debug!("Failed to persist durable log: {}", e);
    }
}

/// Drop the durable log slot. Failures are logged and swallowed.
pub fn clear_entries(storage: &dyn Storage) {
    if let Err(e) = storage.remove(STORAGE_KEY) {
        log::debug!("Failed to clear durable log: {}", e);
    }
}
