//! Query Module
//!
//! Cached-fetch adapter over the cache manager: a shared [`QueryClient`],
//! per-key single-flight fetching and [`CachedQuery`].

mod cached;
mod client;
mod flight;
mod state;

pub use cached::{Cacheable, CachedQuery, CachedQueryBuilder};
pub use client::QueryClient;
pub use flight::SingleFlight;
pub use state::QueryState;
