//! Cache Module
//!
//! Provides the in-process TTL cache with session-storage mirroring and
//! namespace-scoped invalidation.

mod entry;
mod generation;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, PersistedEntry, SetOptions};
pub use key::{in_namespace, namespace_of, namespaced_key, NAMESPACE_SEPARATOR};
pub use stats::CacheStats;
pub use store::{CacheConfig, CacheManager, DEFAULT_STORAGE_PREFIX, DEFAULT_TTL};

// == Public Constants ==
/// Maximum allowed key length in bytes for keys arriving over the
/// diagnostics API
pub const MAX_KEY_LENGTH: usize = 1024;
