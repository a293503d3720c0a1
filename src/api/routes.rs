//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, clear_namespace_handler, delete_handler, health_handler, key_handler,
    realtime_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /keys/:key` - Remaining lifetime of a live key
/// - `DELETE /keys/:key` - Invalidate a key
/// - `DELETE /namespaces/:namespace` - Invalidate a namespace
/// - `DELETE /cache` - Invalidate everything
/// - `POST /realtime` - Apply a backend row-change notification
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/keys/:key", get(key_handler).delete(delete_handler))
        .route("/namespaces/:namespace", delete(clear_namespace_handler))
        .route("/cache", delete(clear_handler))
        .route("/realtime", post(realtime_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
