//! In-memory session storage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{SessionStorage, StorageError, StorageResult};

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<String, String>,
    quota_bytes: Option<usize>,
    unavailable: bool,
}

impl Inner {
    fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable {
            return Err(StorageError::Unavailable(
                "session storage is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

// == Memory Storage ==
/// Session storage held in process memory.
///
/// Clones share the same underlying map, so a cache manager can be torn down
/// and rebuilt over the same handle to simulate a page reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStorage {
    /// Creates an empty, unbounded storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage that rejects writes once keys plus values exceed
    /// `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        let storage = Self::new();
        storage.inner.lock().quota_bytes = Some(quota_bytes);
        storage
    }

    /// Turns every operation into `StorageError::Unavailable` (or back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let inner = self.inner.lock();
        inner.check_available()?;
        Ok(inner.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        if let Some(quota) = inner.quota_bytes {
            let replaced = inner
                .items
                .get(key)
                .map(|old| key.len() + old.len())
                .unwrap_or(0);
            let used = inner.used_bytes() - replaced;
            let needed = key.len() + value.len();
            if used + needed > quota {
                return Err(StorageError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }

        inner.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        inner.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let inner = self.inner.lock();
        inner.check_available()?;
        Ok(inner.items.keys().cloned().collect())
    }
}
