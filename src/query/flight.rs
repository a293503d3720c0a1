//! Single-flight registry.
//!
//! Keeps at most one in-flight fetch per cache key. Callers arriving while a
//! fetch is running await the same shared future instead of starting their
//! own. Each flight carries the cache generation it started under; a caller
//! holding a newer generation (after an invalidation or a forced refetch)
//! replaces the flight instead of joining a result that is already stale.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::FetchError;

type ErasedValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<ErasedValue, FetchError>>>;

struct Flight {
    id: u64,
    generation: u64,
    future: SharedFetch,
}

// == Single Flight ==
/// Per-key in-flight fetch de-duplication.
#[derive(Default)]
pub struct SingleFlight {
    in_flight: Mutex<HashMap<String, Flight>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for SingleFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the future built by `start` for `key`, or joins the one already
    /// running for it.
    ///
    /// A running flight is joined only if it started at `generation` or
    /// later. Otherwise `start` is invoked and its flight replaces the old
    /// one, which keeps running for the callers already awaiting it.
    pub async fn run<T, F, Fut>(&self, key: &str, generation: u64, start: F) -> Result<T, FetchError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let (id, future) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(flight) if flight.generation >= generation => {
                    debug!("Joining in-flight fetch for '{}'", key);
                    (flight.id, flight.future.clone())
                }
                superseded => {
                    if superseded.is_some() {
                        debug!("Replacing stale in-flight fetch for '{}'", key);
                    }
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let fut = start();
                    let future = async move { fut.await.map(|value| Arc::new(value) as ErasedValue) }
                        .boxed()
                        .shared();
                    in_flight.insert(
                        key.to_string(),
                        Flight {
                            id,
                            generation,
                            future: future.clone(),
                        },
                    );
                    (id, future)
                }
            }
        };

        let result = future.await;

        {
            let mut in_flight = self.in_flight.lock();
            if in_flight.get(key).is_some_and(|flight| flight.id == id) {
                in_flight.remove(key);
            }
        }

        let value = result?;
        value.downcast_ref::<T>().cloned().ok_or_else(|| {
            FetchError::new(format!(
                "in-flight fetch for '{key}' produced a different type"
            ))
        })
    }

    /// Number of keys with a fetch currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// True if a fetch for `key` is in flight.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().contains_key(key)
    }
}
