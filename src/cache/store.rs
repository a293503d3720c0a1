//! Cache Store Module
//!
//! Main cache engine: a TTL key/value map with an optional session-storage
//! mirror and namespace-scoped invalidation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::entry::{duration_ms, PersistedEntryRef, Slot};
use crate::cache::generation::Generations;
use crate::cache::key::in_namespace;
use crate::cache::{current_timestamp_ms, CacheEntry, CacheStats, PersistedEntry, SetOptions};
use crate::storage::SessionStorage;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Reserved prefix marking session-storage keys owned by the cache.
pub const DEFAULT_STORAGE_PREFIX: &str = "repacked_cache_";

// == Cache Config ==
/// Configuration for the cache manager.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL used when a write does not specify one
    pub default_ttl: Duration,
    /// Prefix applied to every session-storage key the cache writes
    pub storage_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
    generations: Generations,
}

// == Cache Manager ==
/// TTL cache shared by every cached query in the application.
///
/// Construct once at startup and share it as `Arc<CacheManager>`. All
/// operations are synchronous; storage failures are logged and swallowed.
pub struct CacheManager {
    inner: Mutex<Inner>,
    storage: Option<Arc<dyn SessionStorage>>,
    config: CacheConfig,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("entries", &self.inner.lock().entries.len())
            .field("persistent", &self.storage.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl CacheManager {
    // == Constructors ==
    /// Creates a memory-only cache. `persist` writes behave as memory-only.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            storage: None,
            config,
        }
    }

    /// Creates a cache mirrored into `storage`, loading every live entry a
    /// previous manager persisted there.
    pub fn with_storage(storage: Arc<dyn SessionStorage>, config: CacheConfig) -> Self {
        let manager = Self {
            inner: Mutex::new(Inner::default()),
            storage: Some(storage),
            config,
        };
        manager.rehydrate();
        manager
    }

    /// Configuration in use.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry and resetting
    /// its timestamp.
    pub fn set<T>(&self, key: impl Into<String>, value: T, options: SetOptions)
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.write(key.into(), value, options, None);
    }

    /// Stores `value` only if `key` has not been invalidated since
    /// `generation` was read. Returns whether the write landed.
    ///
    /// Fetches record [`generation`](Self::generation) when they start and
    /// write through this, so a result that raced an invalidation is dropped
    /// instead of resurrecting the stale value.
    pub fn set_if_current<T>(
        &self,
        key: impl Into<String>,
        value: T,
        options: SetOptions,
        generation: u64,
    ) -> bool
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.write(key.into(), value, options, Some(generation))
    }

    // == Generations ==
    /// Current write generation of `key`. It moves forward whenever the key
    /// is deleted or covered by a namespace clear or a full clear.
    pub fn generation(&self, key: &str) -> u64 {
        self.inner.lock().generations.of(key)
    }

    /// Moves `key` to a new generation without removing its entry, so writes
    /// started earlier can no longer land. Returns the new generation.
    pub fn advance_generation(&self, key: &str) -> u64 {
        self.inner.lock().generations.advance_key(key)
    }

    fn write<T>(&self, key: String, value: T, options: SetOptions, expected: Option<u64>) -> bool
    where
        T: Serialize + Send + Sync + 'static,
    {
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);

        let encoded = if options.persist && self.storage.is_some() {
            let envelope = PersistedEntryRef {
                value: &value,
                created_at: current_timestamp_ms(),
                ttl: duration_ms(ttl),
            };
            match serde_json::to_string(&envelope) {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    warn!("Cache entry '{}' is not serializable, keeping it in memory only: {}", key, e);
                    None
                }
            }
        } else {
            None
        };
        let approx_bytes = match &encoded {
            Some(encoded) => encoded.len(),
            None => serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0),
        };

        // Mirror under the lock so an invalidation cannot slip between the
        // generation check and the durable write.
        let mut inner = self.inner.lock();
        if let Some(expected) = expected {
            if inner.generations.of(&key) != expected {
                debug!("Dropping stale write for '{}' (invalidated while fetching)", key);
                return false;
            }
        }

        let persisted = encoded
            .as_deref()
            .is_some_and(|encoded| self.mirror_write(&key, encoded));
        let entry = CacheEntry::new(Slot::Typed(Arc::new(value)), ttl, persisted, approx_bytes);
        let previous = inner.entries.insert(key.clone(), entry);

        // A memory-only overwrite must not leave an older durable copy that
        // would resurface after a reload.
        if !persisted && previous.is_some_and(|p| p.persisted) {
            self.mirror_remove(&key);
        }
        drop(inner);

        debug!("Cache set '{}' (ttl={}ms, persisted={})", key, duration_ms(ttl), persisted);
        true
    }

    // == Get ==
    /// Returns the live value stored under `key`.
    ///
    /// Expired entries are purged and reported as misses. Reads never extend
    /// an entry's lifetime. A value written as a different Rust type is
    /// converted through its JSON form (`&str` written, `String` read); if
    /// that fails it is reported as a miss and left in place. A rehydrated
    /// value that does not decode into `T` is purged.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();

        let Some(entry) = inner.entries.get_mut(key) else {
            inner.stats.record_miss();
            debug!("Cache miss '{}'", key);
            return None;
        };

        if entry.is_expired() {
            let persisted = entry.persisted;
            inner.entries.remove(key);
            inner.stats.record_expirations(1);
            inner.stats.record_miss();
            drop(inner);
            if persisted {
                self.mirror_remove(key);
            }
            debug!("Cache miss '{}' (expired)", key);
            return None;
        }

        // Err(true) purges the entry, Err(false) only reports a miss
        let was_raw = matches!(entry.slot, Slot::Raw(_));
        let decoded: Result<T, bool> = match &entry.slot {
            Slot::Typed(value) => match value.as_any().downcast_ref::<T>() {
                Some(value) => Ok(value.clone()),
                None => value
                    .to_json()
                    .and_then(serde_json::from_value::<T>)
                    .map_err(|_| false),
            },
            Slot::Raw(json) => serde_json::from_value::<T>(json.clone()).map_err(|e| {
                warn!("Dropping cache entry '{}' that does not match the requested type: {}", key, e);
                true
            }),
        };
        if was_raw {
            if let Ok(value) = &decoded {
                entry.slot = Slot::Typed(Arc::new(value.clone()));
            }
        }

        match decoded {
            Ok(value) => {
                inner.stats.record_hit();
                debug!("Cache hit '{}'", key);
                Some(value)
            }
            Err(purge) => {
                inner.stats.record_miss();
                if purge {
                    let persisted = inner.entries.remove(key).is_some_and(|e| e.persisted);
                    drop(inner);
                    if persisted {
                        self.mirror_remove(key);
                    }
                } else {
                    debug!("Cache entry '{}' holds a different type", key);
                }
                None
            }
        }
    }

    // == Has ==
    /// Returns true if a live entry exists under `key`. Expired entries are
    /// purged as a side effect.
    pub fn has(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            None => false,
            Some(entry) if entry.is_expired() => {
                let persisted = entry.persisted;
                inner.entries.remove(key);
                inner.stats.record_expirations(1);
                drop(inner);
                if persisted {
                    self.mirror_remove(key);
                }
                false
            }
            Some(_) => true,
        }
    }

    // == Time To Live ==
    /// Remaining lifetime of a live entry.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| Duration::from_millis(e.ttl_remaining_ms()))
    }

    // == Delete ==
    /// Removes `key` from memory and session storage. Idempotent.
    ///
    /// The key moves to a new generation even when absent, so a fetch still
    /// in flight for it cannot write its result back.
    ///
    /// Returns true if an in-memory entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            inner.generations.advance_key(key);
            let removed = inner.entries.remove(key).is_some();
            self.mirror_remove(key);
            removed
        };
        if removed {
            debug!("Cache delete '{}'", key);
        }
        removed
    }

    // == Clear ==
    /// Removes every entry, including every session-storage item carrying
    /// the cache prefix. Foreign storage items are untouched.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut inner = self.inner.lock();
            inner.generations.advance_all();
            let count = inner.entries.len();
            inner.entries.clear();
            self.mirror_remove_matching(|_| true);
            count
        };
        info!("Cache cleared ({} entries)", removed);
        removed
    }

    // == Clear Namespace ==
    /// Removes every entry whose key starts with `"<namespace>:"`.
    pub fn clear_namespace(&self, namespace: &str) -> usize {
        let removed = {
            let mut inner = self.inner.lock();
            inner.generations.advance_namespace(namespace);
            let before = inner.entries.len();
            inner.entries.retain(|key, _| !in_namespace(key, namespace));
            self.mirror_remove_matching(|key| in_namespace(key, namespace));
            before - inner.entries.len()
        };
        info!("Cache namespace '{}' cleared ({} entries)", namespace, removed);
        removed
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from memory and session storage.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let expired: Vec<(String, bool)> = {
            let mut inner = self.inner.lock();
            let expired: Vec<(String, bool)> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, entry)| (key.clone(), entry.persisted))
                .collect();
            for (key, _) in &expired {
                inner.entries.remove(key);
            }
            inner.stats.record_expirations(expired.len());
            expired
        };

        for (key, persisted) in &expired {
            if *persisted {
                self.mirror_remove(key);
            }
        }
        expired.len()
    }

    // == Stats ==
    /// Returns a diagnostic snapshot.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.entry_count = inner.entries.len();
        stats.approximate_bytes = inner.entries.values().map(|e| e.approx_bytes).sum();
        stats
    }

    /// Keys currently held in memory, expired or not.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    // == Length ==
    /// Returns the current number of in-memory entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    // == Session Storage Mirror ==
    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.config.storage_prefix, key)
    }

    fn mirror_write(&self, key: &str, encoded: &str) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };
        match storage.set_item(&self.storage_key(key), encoded) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist cache entry '{}', keeping it in memory only: {}", key, e);
                false
            }
        }
    }

    fn mirror_remove(&self, key: &str) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage.remove_item(&self.storage_key(key)) {
            warn!("Failed to remove persisted cache entry '{}': {}", key, e);
        }
    }

    /// Removes storage items owned by the cache whose unprefixed key matches.
    fn mirror_remove_matching(&self, matches: impl Fn(&str) -> bool) {
        let Some(storage) = &self.storage else {
            return;
        };
        let keys = match storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to enumerate session storage: {}", e);
                return;
            }
        };
        for storage_key in keys {
            let Some(key) = storage_key.strip_prefix(&self.config.storage_prefix) else {
                continue;
            };
            if matches(key) {
                if let Err(e) = storage.remove_item(&storage_key) {
                    warn!("Failed to remove persisted cache entry '{}': {}", key, e);
                }
            }
        }
    }

    // == Rehydrate ==
    /// Loads live persisted entries; drops expired and corrupt ones.
    fn rehydrate(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let keys = match storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Session storage unavailable, starting with an empty cache: {}", e);
                return;
            }
        };

        let now = current_timestamp_ms();
        let mut loaded = 0usize;
        let mut dropped = 0usize;
        let mut inner = self.inner.lock();

        for storage_key in keys {
            let Some(key) = storage_key.strip_prefix(&self.config.storage_prefix) else {
                continue;
            };

            let raw = match storage.get_item(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to read persisted cache entry '{}': {}", key, e);
                    continue;
                }
            };

            let envelope = match serde_json::from_str::<PersistedEntry>(&raw) {
                Ok(envelope) if !envelope.is_expired_at(now) => envelope,
                Ok(_) => {
                    dropped += 1;
                    if let Err(e) = storage.remove_item(&storage_key) {
                        warn!("Failed to remove expired cache entry '{}': {}", key, e);
                    }
                    continue;
                }
                Err(e) => {
                    warn!("Dropping corrupt persisted cache entry '{}': {}", key, e);
                    dropped += 1;
                    if let Err(e) = storage.remove_item(&storage_key) {
                        warn!("Failed to remove corrupt cache entry '{}': {}", key, e);
                    }
                    continue;
                }
            };

            inner.entries.insert(
                key.to_string(),
                CacheEntry {
                    slot: Slot::Raw(envelope.value),
                    created_at: envelope.created_at,
                    ttl_ms: envelope.ttl,
                    persisted: true,
                    approx_bytes: raw.len(),
                },
            );
            loaded += 1;
        }

        info!(
            "Cache rehydrated from session storage: loaded={}, dropped={}",
            loaded, dropped
        );
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
