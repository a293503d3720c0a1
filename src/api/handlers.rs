//! API Handlers
//!
//! HTTP request handlers for the cache diagnostics and invalidation
//! endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::CacheManager;
use crate::error::{CacheError, Result};
use crate::models::{
    validate_key, validate_namespace, ClearResponse, DeleteResponse, HealthResponse, KeyResponse,
    RealtimeResponse, StatsResponse,
};
use crate::realtime::{InvalidationRouter, RowChange};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache
    pub cache: Arc<CacheManager>,
    /// Row-change to invalidation mapping over the same cache
    pub invalidations: Arc<InvalidationRouter>,
}

impl AppState {
    /// Creates a new AppState over the given cache.
    pub fn new(cache: Arc<CacheManager>) -> Self {
        let invalidations = Arc::new(InvalidationRouter::new(Arc::clone(&cache)));
        Self {
            cache,
            invalidations,
        }
    }
}

/// Handler for GET /keys/:key
///
/// Reports whether a live entry exists and how long it has left.
pub async fn key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = state
        .cache
        .ttl_remaining(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(KeyResponse {
        key,
        ttl_remaining_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
    }))
}

/// Handler for DELETE /keys/:key
///
/// Invalidates one key. Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let removed = state.cache.delete(&key);
    Ok(Json(DeleteResponse::new(key, removed)))
}

/// Handler for DELETE /namespaces/:namespace
pub async fn clear_namespace_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<ClearResponse>> {
    if let Some(error_msg) = validate_namespace(&namespace) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let removed = state.cache.clear_namespace(&namespace);
    Ok(Json(ClearResponse {
        namespace: Some(namespace),
        removed,
    }))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.cache.clear();
    Json(ClearResponse {
        namespace: None,
        removed,
    })
}

/// Handler for POST /realtime
///
/// Receives a backend row-change notification and applies the matching
/// invalidations.
pub async fn realtime_handler(
    State(state): State<AppState>,
    Json(change): Json<RowChange>,
) -> Result<Json<RealtimeResponse>> {
    if change.table.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Table cannot be empty".to_string(),
        ));
    }

    let applied = state.invalidations.apply(&change);
    Ok(Json(RealtimeResponse { applied }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SetOptions;
    use crate::realtime::ChangeEvent;
    use serde_json::json;

    fn state_with(keys: &[&str]) -> AppState {
        let cache = Arc::new(CacheManager::default());
        for key in keys {
            cache.set(*key, 1u32, SetOptions::default());
        }
        AppState::new(cache)
    }

    #[tokio::test]
    async fn test_key_handler_found() {
        let state = state_with(&["posts:7"]);
        let response = key_handler(State(state), Path("posts:7".to_string()))
            .await
            .unwrap();
        assert_eq!(response.key, "posts:7");
        assert!(response.ttl_remaining_ms > 0);
    }

    #[tokio::test]
    async fn test_key_handler_missing() {
        let state = state_with(&[]);
        let result = key_handler(State(state), Path("posts:7".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler_idempotent() {
        let state = state_with(&["posts:7"]);

        let first = delete_handler(State(state.clone()), Path("posts:7".to_string()))
            .await
            .unwrap();
        assert!(first.removed);

        let second = delete_handler(State(state), Path("posts:7".to_string()))
            .await
            .unwrap();
        assert!(!second.removed);
    }

    #[tokio::test]
    async fn test_clear_namespace_handler() {
        let state = state_with(&["posts:1", "posts:2", "profiles:42"]);
        let response = clear_namespace_handler(State(state.clone()), Path("posts".to_string()))
            .await
            .unwrap();

        assert_eq!(response.removed, 2);
        assert!(state.cache.has("profiles:42"));
    }

    #[tokio::test]
    async fn test_clear_namespace_rejects_separator() {
        let state = state_with(&[]);
        let result = clear_namespace_handler(State(state), Path("posts:1".to_string())).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_realtime_handler() {
        let state = state_with(&["posts:7", "postLists:recent"]);
        let change = RowChange::new("posts", ChangeEvent::Update, json!({"id": "7"}));

        let response = realtime_handler(State(state.clone()), Json(change))
            .await
            .unwrap();

        assert_eq!(response.applied.len(), 2);
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = state_with(&["posts:1"]);
        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.entry_count, 1);
        assert_eq!(response.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
