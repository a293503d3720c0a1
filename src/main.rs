//! Repacked Cache - diagnostics and invalidation server
//!
//! Hosts the session cache and exposes it over HTTP so operators can
//! inspect entries and the backend can push row-change invalidations.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repacked_cache::api::{create_router, AppState};
use repacked_cache::cache::CacheManager;
use repacked_cache::config::Config;
use repacked_cache::storage::{DirStorage, MemoryStorage, SessionStorage};
use repacked_cache::tasks::spawn_sweep_task;

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open session storage and rehydrate the cache from it
/// 4. Start background expiry sweep
/// 5. Serve the diagnostics router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repacked_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Repacked cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_ttl={}ms, sweep_interval={}s, port={}, session_dir={:?}",
        config.default_ttl_ms, config.sweep_interval, config.server_port, config.session_dir
    );

    let storage: Arc<dyn SessionStorage> = match &config.session_dir {
        Some(dir) => Arc::new(
            DirStorage::open(dir)
                .with_context(|| format!("failed to open session storage at {}", dir.display()))?,
        ),
        None => Arc::new(MemoryStorage::new()),
    };

    let cache = Arc::new(CacheManager::with_storage(storage, config.cache_config()));
    info!(entries = cache.len(), "Cache initialized");

    let sweep_handle = spawn_sweep_task(Arc::clone(&cache), config.sweep_interval());
    info!("Background sweep task started");

    let app = create_router(AppState::new(cache));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the sweep.
async fn shutdown_signal(sweep_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    sweep_handle.abort();
    warn!("Sweep task aborted");
}
