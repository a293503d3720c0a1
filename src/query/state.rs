//! Observable state of a cached query.

use crate::error::FetchError;

// == Query State ==
/// What a UI needs to render a cached query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    /// Last successfully loaded value; kept when a later fetch fails
    pub data: Option<T>,
    /// A fetch is running
    pub loading: bool,
    /// Failure of the most recent fetch
    pub error: Option<FetchError>,
    /// `data` came from the cache rather than the fetcher
    pub is_from_cache: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            is_from_cache: false,
        }
    }
}

impl<T> QueryState<T> {
    /// True when data is present and no fetch is pending.
    pub fn is_ready(&self) -> bool {
        self.data.is_some() && !self.loading
    }
}
