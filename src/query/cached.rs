//! Cached query: a fetcher composed with the cache.
//!
//! A query answers from the cache when it can and from its fetcher when it
//! must, publishing `data / loading / error / is_from_cache` through a watch
//! channel the UI can observe.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::SetOptions;
use crate::error::{CacheError, FetchError, Result};
use crate::query::{QueryClient, QueryState};
use crate::realtime::Invalidation;

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<T, FetchError>> + Send + Sync>;
type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Bounds every cached value satisfies.
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

// == Builder ==
/// Builder for [`CachedQuery`].
pub struct CachedQueryBuilder<T> {
    client: QueryClient,
    key: String,
    fetcher: Option<Fetcher<T>>,
    enabled: bool,
    ttl: Option<Duration>,
    persist: bool,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T: Cacheable> CachedQueryBuilder<T> {
    /// Operation producing a fresh value.
    pub fn fetcher<F, Fut>(mut self, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, FetchError>> + Send + 'static,
    {
        self.fetcher = Some(Arc::new(move || fetcher().boxed()));
        self
    }

    /// A disabled query never loads.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Lifetime of the cached value; defaults to the cache's default TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Mirror fetched values into session storage.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Called with every value the query delivers, cached or fetched.
    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Called with every fetch failure.
    pub fn on_error(mut self, callback: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Finishes the query. Fails when the key is empty or no fetcher was
    /// given.
    pub fn build(self) -> Result<CachedQuery<T>> {
        if self.key.is_empty() {
            return Err(CacheError::Misconfigured(
                "cached query needs a non-empty cache key".to_string(),
            ));
        }
        let fetcher = self.fetcher.ok_or_else(|| {
            CacheError::Misconfigured(format!("cached query '{}' has no fetcher", self.key))
        })?;

        let (state, _) = watch::channel(QueryState::default());
        Ok(CachedQuery {
            client: self.client,
            key: self.key,
            fetcher,
            enabled: self.enabled,
            options: SetOptions {
                ttl: self.ttl,
                persist: self.persist,
            },
            on_success: self.on_success,
            on_error: self.on_error,
            state,
            mounted: Arc::new(AtomicBool::new(true)),
            fetch_seq: AtomicU64::new(0),
        })
    }
}

// == Cached Query ==
/// A cache-backed view over one fetcher.
///
/// `load` plays the role of a mount or key change: it answers from the cache
/// when a live entry exists and fetches otherwise. `refetch` always fetches.
/// Each call makes at most one fetch attempt; there are no retries.
pub struct CachedQuery<T> {
    client: QueryClient,
    key: String,
    fetcher: Fetcher<T>,
    enabled: bool,
    options: SetOptions,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
    state: watch::Sender<QueryState<T>>,
    mounted: Arc<AtomicBool>,
    // Sequence of the newest fetch; older overlapping fetches do not publish
    fetch_seq: AtomicU64,
}

impl<T: Cacheable> CachedQuery<T> {
    /// Starts building a query for `key`.
    pub fn builder(client: &QueryClient, key: impl Into<String>) -> CachedQueryBuilder<T> {
        CachedQueryBuilder {
            client: client.clone(),
            key: key.into(),
            fetcher: None,
            enabled: true,
            ttl: None,
            persist: false,
            on_success: None,
            on_error: None,
        }
    }

    /// Cache key the query reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// False once the owner has gone away.
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Marks the owner as gone. Fetches completing afterwards still populate
    /// the cache but no longer touch state or call callbacks.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    // == Load ==
    /// Answers from the cache, fetching only on a miss.
    pub async fn load(&self) -> QueryState<T> {
        if !self.enabled {
            return self.state();
        }

        if let Some(cached) = self.client.cache().get::<T>(&self.key) {
            debug!("Query '{}' served from cache", self.key);
            if self.is_mounted() {
                self.state.send_modify(|state| {
                    state.data = Some(cached.clone());
                    state.is_from_cache = true;
                    state.loading = false;
                });
                if let Some(callback) = &self.on_success {
                    callback(&cached);
                }
            }
            return self.state();
        }

        let generation = self.client.cache().generation(&self.key);
        self.fetch_fresh(generation).await
    }

    // == Refetch ==
    /// Fetches a fresh value, skipping the cache read.
    ///
    /// Never joins a fetch that started before the call: the key moves to a
    /// new generation, so any older in-flight result is neither shared with
    /// this caller nor written over the fresh one.
    pub async fn refetch(&self) -> QueryState<T> {
        if !self.enabled {
            return self.state();
        }
        let generation = self.client.cache().advance_generation(&self.key);
        self.fetch_fresh(generation).await
    }

    // == Invalidate ==
    /// Drops the cached value without fetching. The next `load` misses and
    /// starts a new fetch; one already in flight can no longer repopulate
    /// the key.
    pub fn invalidate(&self) {
        self.client.cache().delete(&self.key);
    }

    /// Points the query at a new key and loads it, like a key change on a
    /// mounted component. Previous data stays visible until the new value
    /// arrives.
    pub async fn set_key(&mut self, key: impl Into<String>) -> QueryState<T> {
        let key = key.into();
        if key.is_empty() {
            warn!("Ignoring empty cache key for query '{}'", self.key);
            return self.state();
        }
        self.key = key;
        self.load().await
    }

    /// Reacts to a realtime invalidation: refetches when it covers this
    /// query's key. Returns whether a refetch happened.
    pub async fn on_invalidation(&self, invalidation: &Invalidation) -> bool {
        if !invalidation.affects(&self.key) {
            return false;
        }
        self.refetch().await;
        true
    }

    async fn fetch_fresh(&self, generation: u64) -> QueryState<T> {
        let seq = self.fetch_seq.fetch_add(1, Ordering::AcqRel) + 1;
        if self.is_mounted() {
            self.state.send_modify(|state| {
                state.loading = true;
                state.is_from_cache = false;
                state.error = None;
            });
        }

        let cache = Arc::clone(self.client.cache());
        let fetcher = Arc::clone(&self.fetcher);
        let key = self.key.clone();
        let options = self.options;

        let result = self
            .client
            .flights()
            .run(&self.key, generation, move || async move {
                let value = fetcher().await?;
                cache.set_if_current(key, value.clone(), options, generation);
                Ok(value)
            })
            .await;

        if !self.is_mounted() {
            debug!("Discarding result for unmounted query '{}'", self.key);
            return self.state();
        }
        if self.fetch_seq.load(Ordering::Acquire) != seq {
            debug!("Discarding superseded result for query '{}'", self.key);
            return self.state();
        }

        match result {
            Ok(value) => {
                self.state.send_modify(|state| {
                    state.data = Some(value.clone());
                    state.loading = false;
                });
                if let Some(callback) = &self.on_success {
                    callback(&value);
                }
            }
            Err(error) => {
                warn!("Query '{}' failed: {}", self.key, error);
                self.state.send_modify(|state| {
                    state.error = Some(error.clone());
                    state.loading = false;
                });
                if let Some(callback) = &self.on_error {
                    callback(&error);
                }
            }
        }

        self.state()
    }
}

impl<T> Drop for CachedQuery<T> {
    fn drop(&mut self) {
        self.mounted.store(false, Ordering::Release);
    }
}
