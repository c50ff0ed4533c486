//! Bounded search history on top of a pluggable key-value store.
//!
//! The whole history lives under a single key as a JSON array, most recent
//! first, with at most one entry per postal code.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind as IoErrorKind,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::warn;

use crate::AddressRecord;

pub const HISTORY_KEY: &str = "cep-history";
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Minimal string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {}", self.dir.display()))?;

        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug)]
pub struct HistoryStore<S> {
    store: S,
    limit: usize,
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_limit(store, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(store: S, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
        }
    }

    /// Stored entries, most recent first. Missing or unreadable data is an
    /// empty history.
    pub fn load(&self) -> Vec<AddressRecord> {
        let raw = match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "failed to read history");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(error = %err, "discarding unreadable history");
            Vec::new()
        })
    }

    /// Put `record` at the front, replacing any older entry for the same
    /// postal code, and keep only the newest `limit` entries.
    pub fn save(&self, record: &AddressRecord) -> Result<Vec<AddressRecord>> {
        let mut entry = record.clone();
        entry.fetched_at_epoch_ms = Utc::now().timestamp_millis();

        let mut history = self.load();
        history.retain(|item| item.postal_code != entry.postal_code);
        history.insert(0, entry);
        history.truncate(self.limit);

        self.write(&history)?;
        Ok(history)
    }

    /// Drop the entry for `postal_code` (separators are ignored).
    pub fn remove(&self, postal_code: &str) -> Result<Vec<AddressRecord>> {
        let digits: String = postal_code.chars().filter(char::is_ascii_digit).collect();

        let mut history = self.load();
        history.retain(|item| item.postal_code != digits);

        self.write(&history)?;
        Ok(history)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(HISTORY_KEY).context("Failed to clear history")
    }

    fn write(&self, history: &[AddressRecord]) -> Result<()> {
        let json = serde_json::to_string(history).context("Failed to serialize history")?;
        self.store.set(HISTORY_KEY, &json).context("Failed to save history")
    }
}
