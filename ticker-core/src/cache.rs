//! Generic TTL cache.
//!
//! Entries expire lazily: an expired entry is removed when a read touches
//! it, and [`TtlCache::sweep`] evicts everything expired in one pass. The
//! cache is unbounded apart from expiry. A cache can optionally write its
//! entries through to a [`LocalStore`] so memoized values (e.g. server
//! status) survive restarts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::store::{now_ms, LocalStore, StoreError};

/// A cached value with its expiry time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub value: T,
    /// Expiry, milliseconds since the Unix epoch.
    pub expires_at_ms: u64,
}

impl<T> CacheEntry<T> {
    fn expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Keyed TTL cache with lazy expiry.
///
/// Clones share the same entries.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    persist: Option<(LocalStore, String)>,
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            persist: None,
        }
    }
}

impl<T: Clone + Serialize + DeserializeOwned> TtlCache<T> {
    /// In-memory cache with no persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache writing entries through to `store` under `prefix`-ed keys,
    /// preloading entries already persisted there. Entries that fail to
    /// decode are skipped.
    #[must_use]
    pub fn persistent(store: LocalStore, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let mut entries = HashMap::new();
        for (key, value) in store.entries_with_prefix(&prefix) {
            match serde_json::from_value::<CacheEntry<T>>(value) {
                Ok(entry) => {
                    entries.insert(key[prefix.len()..].to_string(), entry);
                }
                Err(e) => {
                    tracing::warn!(key, "persisted cache entry failed to decode: {e}");
                }
            }
        }
        Self {
            entries: Arc::new(RwLock::new(entries)),
            persist: Some((store, prefix)),
        }
    }

    /// Store `value` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns a storage failure when the write-through persist fails; the
    /// in-memory entry is stored regardless.
    pub fn set(&self, key: &str, value: T, ttl: Duration) -> Result<(), StoreError> {
        #[allow(clippy::cast_possible_truncation)]
        let ttl_ms = ttl.as_millis() as u64;
        self.set_at(key, value, ttl_ms, now_ms())
    }

    /// [`TtlCache::set`] with an explicit clock, for deterministic tests.
    ///
    /// # Errors
    ///
    /// Returns a storage failure when the write-through persist fails.
    pub fn set_at(&self, key: &str, value: T, ttl_ms: u64, now_ms: u64) -> Result<(), StoreError> {
        let entry = CacheEntry {
            value,
            expires_at_ms: now_ms.saturating_add(ttl_ms),
        };
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_string(), entry.clone());
        drop(entries);

        if let Some((store, prefix)) = &self.persist {
            store.set(&format!("{prefix}{key}"), &entry)?;
        }
        Ok(())
    }

    /// Fetch `key` if present and not expired. Expired entries are removed.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, now_ms())
    }

    /// [`TtlCache::get`] with an explicit clock, for deterministic tests.
    #[must_use]
    pub fn get_at(&self, key: &str, now_ms: u64) -> Option<T> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = entries.get(key)?;
        if entry.expired_at(now_ms) {
            entries.remove(key);
            drop(entries);
            self.remove_persisted(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Remove `key` regardless of expiry.
    pub fn invalidate(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
        self.remove_persisted(key);
    }

    /// Evict every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(now_ms())
    }

    /// [`TtlCache::sweep`] with an explicit clock, for deterministic tests.
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        drop(entries);

        for key in &expired {
            self.remove_persisted(key);
        }
        expired.len()
    }

    /// Number of entries, expired ones included until they are evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_persisted(&self, key: &str) {
        if let Some((store, prefix)) = &self.persist {
            if let Err(e) = store.remove(&format!("{prefix}{key}")) {
                tracing::warn!(key, "failed to remove persisted cache entry: {e}");
            }
        }
    }
}
