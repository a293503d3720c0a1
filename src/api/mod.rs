//! API Module
//!
//! HTTP handlers and routing for the cache diagnostics surface.
//!
//! # Endpoints
//! - `GET /keys/:key` - Remaining lifetime of a live key
//! - `DELETE /keys/:key` - Invalidate a key
//! - `DELETE /namespaces/:namespace` - Invalidate a namespace
//! - `DELETE /cache` - Invalidate everything
//! - `POST /realtime` - Apply a backend row-change notification
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
