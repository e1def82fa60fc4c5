//! mount-cache server entry point.
//!
//! Wires the topology store, lifecycle manager and HTTP/WebSocket surface,
//! then serves until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mount_cache::api;
use mount_cache::app_state::AppState;
use mount_cache::config::{LogFormat, MountCacheConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = MountCacheConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(
        addr = %config.listen_addr,
        schema_cache_root = %config.schema_cache_root.display(),
        "starting mount-cache"
    );

    // Build components and start the lifecycle manager
    let (state, changes) = AppState::new(&config);
    let manager = Arc::clone(&state.manager);
    let consumer = tokio::spawn(Arc::clone(&manager).run(changes));

    // Build router
    let app = api::build_app(state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router, and with it the topology sender, is gone: the consumer
    // drains what is queued and stops.
    tracing::info!("shutting down");
    if tokio::time::timeout(Duration::from_secs(5), consumer).await.is_err() {
        tracing::warn!("topology consumer did not stop in time");
    }
    manager.close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
