//! Session Storage Module
//!
//! Durable per-session key/value string storage that the cache mirrors
//! persisted entries into. Every operation is fallible: storage may be full,
//! disabled, or backed by a failing disk.

mod dir;
mod memory;

pub use dir::DirStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

// == Storage Error ==
/// Failures raised by a session storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Writing would exceed the storage quota
    #[error("Storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// Storage is disabled or otherwise not reachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Underlying I/O failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded or decoded
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// == Session Storage Trait ==
/// A string-only key/value store scoped to one session.
pub trait SessionStorage: Send + Sync {
    /// Returns the item stored under `key`, if any.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous item.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the item under `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Enumerates every key currently stored.
    fn keys(&self) -> StorageResult<Vec<String>>;
}
