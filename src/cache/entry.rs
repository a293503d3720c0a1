//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support, the
//! per-write options, and the envelope used for the durable mirror.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Set Options ==
/// Per-write options for [`CacheManager::set`](crate::cache::CacheManager::set).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Lifetime of the entry; `None` uses the manager's default TTL
    pub ttl: Option<Duration>,
    /// Mirror the entry into session storage
    pub persist: bool,
}

impl SetOptions {
    /// Options with an explicit TTL and no persistence.
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            persist: false,
        }
    }

    /// Returns a copy with persistence switched on.
    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }
}

// == Slot ==
/// Stored payload.
///
/// Values written in this process keep their Rust type. Values rehydrated
/// from session storage stay as JSON until the first typed read decodes them.
#[derive(Clone)]
pub(crate) enum Slot {
    Typed(Arc<dyn StoredValue>),
    Raw(serde_json::Value),
}

/// A type-erased value that can still be re-encoded as JSON, so a read with
/// a compatible but different type (`&str` written, `String` read) succeeds.
pub(crate) trait StoredValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T> StoredValue for T
where
    T: Serialize + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Typed(_) => f.write_str("Typed(..)"),
            Slot::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub(crate) slot: Slot,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Lifetime in milliseconds
    pub ttl_ms: u64,
    /// Whether the entry is mirrored in session storage
    pub persisted: bool,
    /// Serialized size estimate in bytes
    pub approx_bytes: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub(crate) fn new(slot: Slot, ttl: Duration, persisted: bool, approx_bytes: usize) -> Self {
        Self {
            slot,
            created_at: current_timestamp_ms(),
            ttl_ms: duration_ms(ttl),
            persisted,
            approx_bytes,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is live while `now - created_at <= ttl`; it expires on the
    /// first millisecond past that.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against an explicit timestamp.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > self.ttl_ms
    }

    // == Time To Live ==
    /// Returns remaining lifetime in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        let deadline = self.created_at.saturating_add(self.ttl_ms);
        deadline.saturating_sub(current_timestamp_ms())
    }
}

// == Persisted Entry ==
/// Envelope written to session storage for persisted entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    pub value: serde_json::Value,
    pub created_at: u64,
    pub ttl: u64,
}

impl PersistedEntry {
    /// Checks the envelope's lifetime against an explicit timestamp.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > self.ttl
    }
}

/// Borrowing twin of [`PersistedEntry`] so writes serialize the value once.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedEntryRef<'a, T: Serialize> {
    pub value: &'a T,
    pub created_at: u64,
    pub ttl: u64,
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or(0)
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
