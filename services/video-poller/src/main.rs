//! YouTube search poller
//!
//! Single-binary Rust service that:
//! 1. Polls the search API on a fixed interval for new videos matching a query
//! 2. Rotates across multiple API keys as their quotas run out
//! 3. Upserts results into a local store, keyed by video id
//! 4. Serves a read-only video API plus a separate admin surface for keys

mod admin;
mod api;
mod config;
mod error;
mod fetch;
mod ingest;
mod metrics;
mod model;
mod scheduler;
mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use youtube_keys::KeyStore;
use youtube_pool::KeyPool;

use crate::config::Config;
use crate::fetch::VideoFetcher;
use crate::store::VideoStore;

/// Bound on how long in-flight requests may drain after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting video-poller");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        query = %config.poller.query,
        interval_secs = config.poller.interval_secs,
        page_size = config.poller.page_size,
        listen_addr = %config.server.listen_addr,
        admin_addr = %config.server.admin_addr,
        "configuration loaded"
    );

    for path in [&config.storage.keys_path, &config.storage.videos_path] {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating storage directory {}", parent.display()))?;
        }
    }

    let keys = Arc::new(
        KeyStore::load(config.storage.keys_path.clone())
            .await
            .context("loading key store")?,
    );

    let imported = admin::import_env_keys(&keys)
        .await
        .context("importing keys from environment")?;
    if imported > 0 {
        info!(imported, "imported api keys from environment");
    }
    if keys.is_empty().await {
        warn!("no api keys configured; fetches will be skipped until keys are added via the admin api");
    }

    let videos = Arc::new(
        VideoStore::load(config.storage.videos_path.clone())
            .await
            .context("loading video store")?,
    );

    let pool = KeyPool::new(keys);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.poller.timeout_secs))
        .build()
        .context("building http client")?;

    let fetcher = Arc::new(VideoFetcher::new(
        pool.clone(),
        client,
        config.poller.search_url.clone(),
        config.poller.page_size,
        config.poller.lookback_hours,
    ));

    let _poll_task = scheduler::spawn_poll_task(
        fetcher,
        videos.clone(),
        config.poller.query.clone(),
        Duration::from_secs(config.poller.interval_secs),
    );

    let app = api::build_router(
        api::AppState {
            pool: pool.clone(),
            videos,
            prometheus: prometheus_handle,
        },
        config.server.max_connections,
    );
    let admin_app = admin::build_admin_router(admin::AdminState::new(pool));

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;
    let admin_listener = TcpListener::bind(config.server.admin_addr)
        .await
        .with_context(|| format!("failed to bind admin listener to {}", config.server.admin_addr))?;

    info!(
        addr = %config.server.listen_addr,
        admin_addr = %config.server.admin_addr,
        "accepting requests"
    );

    // Graceful shutdown: on SIGTERM/SIGINT both listeners stop accepting and
    // drain in-flight requests; DRAIN_TIMEOUT keeps a slow client from
    // holding the process open. The drain timer starts at signal receipt.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server_handle = {
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await
        })
    };
    let admin_handle = {
        let mut shutdown = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(admin_listener, admin_app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await
        })
    };

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    let drain = async {
        match server_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "server error during shutdown"),
            Err(e) => error!(error = %e, "server task panicked"),
        }
        match admin_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "admin server error during shutdown"),
            Err(e) => error!(error = %e, "admin server task panicked"),
        }
    };

    match tokio::time::timeout(DRAIN_TIMEOUT, drain).await {
        Ok(()) => info!("all in-flight requests drained"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
