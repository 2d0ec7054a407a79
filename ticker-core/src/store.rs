//! Local key/value persistence.
//!
//! [`LocalStore`] keeps an in-memory map of JSON values behind a lock, with
//! optional file-per-key persistence under a data directory. Every persisted
//! Ticker concern (draft slot, history mirror, identity, consent flag, cache
//! entries) goes through this one store, so storage failures surface in a
//! single place as [`StoreError`].

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Key of the single draft slot.
pub const KEY_DRAFT: &str = "draft";
/// Key of the persisted history mirror.
pub const KEY_HISTORY: &str = "history";
/// Key of the persisted user identity.
pub const KEY_IDENTITY: &str = "identity";
/// Key of the persisted privacy-consent flag.
pub const KEY_PRIVACY: &str = "privacy_agreed";
/// Prefix for persisted cache entries.
pub const CACHE_PREFIX: &str = "cache_";

/// Errors from local persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized to JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is empty or contains path separators.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Key→JSON persistence with an optional backing directory.
///
/// Clones share the same underlying map. Without a data directory the store
/// is purely in-memory (the mode unit tests use).
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
    data_dir: Option<PathBuf>,
}

impl LocalStore {
    /// Create an in-memory store with no persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store persisting to `data_dir`, loading any entries already
    /// on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or read.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let mut entries = HashMap::new();
        for entry in fs::read_dir(&data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_filename)
            else {
                tracing::warn!(path = %path.display(), "skipping entry with unreadable name");
                continue;
            };
            match fs::read_to_string(&path).map_err(StoreError::from).and_then(|raw| {
                serde_json::from_str::<Value>(&raw).map_err(StoreError::from)
            }) {
                Ok(value) => {
                    entries.insert(key, value);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable entry: {e}");
                }
            }
        }

        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            data_dir: Some(data_dir),
        })
    }

    /// Store a value under `key`, persisting it when a data dir is set.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is invalid, the value cannot be
    /// serialized, or the file write fails. The in-memory entry is updated
    /// even when the file write fails.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        Self::validate_key(key)?;
        let value = serde_json::to_value(value)?;

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_string(), value.clone());
        drop(entries);

        if let Some(path) = self.entry_path(key) {
            fs::write(&path, serde_json::to_string_pretty(&value)?)?;
        }
        Ok(())
    }

    /// Fetch and decode the value under `key`.
    ///
    /// Returns `None` when the key is absent or the stored value no longer
    /// decodes as `T` (logged, treated as missing).
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let value = entries.get(key)?.clone();
        drop(entries);

        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key, "stored value failed to decode: {e}");
                None
            }
        }
    }

    /// Raw JSON value under `key`, if any.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Remove `key`, deleting its file when persisted. Missing keys are fine.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing file exists but cannot be removed.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
        drop(entries);

        if let Some(path) = self.entry_path(key) {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Whether `key` currently has a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(key)
    }

    /// Snapshot of all `(key, value)` pairs whose key starts with `prefix`.
    #[must_use]
    pub fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, Value)> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", encode_filename(key))))
    }

    fn validate_key(key: &str) -> Result<(), StoreError> {
        if key.is_empty() || key.contains('/') || key.contains('\\') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}

/// Encode a key as a file stem. Alphanumerics and `-` pass through; every
/// other character (including `_`) becomes a `_`-delimited hex scalar, so
/// distinct keys always map to distinct file names.
fn encode_filename(key: &str) -> String {
    use std::fmt::Write;

    let mut name = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_alphanumeric() || c == '-' {
            name.push(c);
        } else {
            let _ = write!(name, "_{:x}_", u32::from(c));
        }
    }
    name
}

/// Inverse of [`encode_filename`]. Returns `None` for stems this store never
/// wrote (stray files in the data dir).
fn decode_filename(stem: &str) -> Option<String> {
    let mut key = String::with_capacity(stem.len());
    let mut chars = stem.chars();
    while let Some(c) = chars.next() {
        if c == '_' {
            let hex: String = chars.by_ref().take_while(|&c| c != '_').collect();
            key.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
        } else {
            key.push(c);
        }
    }
    Some(key)
}
