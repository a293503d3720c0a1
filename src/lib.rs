//! Repacked Cache - client-side data cache for the Repacked marketplace
//!
//! TTL key/value cache with session-storage persistence and namespace
//! invalidation, plus cached queries that wrap backend fetches.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod realtime;
pub mod resources;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheConfig, CacheManager, SetOptions};
pub use config::Config;
pub use error::{CacheError, FetchError};
pub use query::{CachedQuery, QueryClient, QueryState};
pub use tasks::spawn_sweep_task;
