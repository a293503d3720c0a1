//! Query client: the shared context every cached query runs in.

use std::sync::Arc;

use crate::cache::{CacheConfig, CacheManager};
use crate::query::SingleFlight;

// == Query Client ==
/// Cache plus in-flight registry, shared by every query of the app.
///
/// Cloning is cheap; all clones see the same cache and the same in-flight
/// fetches.
#[derive(Debug, Clone)]
pub struct QueryClient {
    cache: Arc<CacheManager>,
    flights: Arc<SingleFlight>,
}

impl QueryClient {
    /// Wraps an existing cache manager.
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self {
            cache,
            flights: Arc::new(SingleFlight::new()),
        }
    }

    /// Client over a fresh memory-only cache.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(CacheManager::new(CacheConfig::default())))
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// The shared in-flight registry.
    pub fn flights(&self) -> &Arc<SingleFlight> {
        &self.flights
    }
}
