//! Shared harness: serves the full application on an ephemeral port.

#![allow(clippy::panic, dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use mount_cache::api;
use mount_cache::app_state::AppState;
use mount_cache::config::MountCacheConfig;

pub const SYSTEM_MODULE: &str = r#"module example-system {
  namespace "urn:example:system";
  prefix sys;
  revision 2024-01-01;
  container system { leaf hostname { type string; } }
}"#;

pub const CAPABILITY: &str = "urn:example:system?module=example-system&revision=2024-01-01";

/// Writes the example module into `<root>/<dir>`.
pub fn seed(root: &Path, dir: &str) {
    let dir = root.join(dir);
    if let Err(err) = std::fs::create_dir_all(&dir) {
        panic!("create dir: {err}");
    }
    if let Err(err) = std::fs::write(dir.join("example-system@2024-01-01.yang"), SYSTEM_MODULE) {
        panic!("write module: {err}");
    }
}

/// Starts the manager loop and the HTTP server; returns the bound address.
pub async fn spawn_app(cache_root: &Path) -> (SocketAddr, AppState) {
    let config = MountCacheConfig {
        schema_cache_root: cache_root.to_path_buf(),
        ..MountCacheConfig::default()
    };
    let (state, changes) = AppState::new(&config);
    tokio::spawn(std::sync::Arc::clone(&state.manager).run(changes));

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    let app = api::build_app(state.clone(), Duration::from_secs(10));
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            panic!("server failed: {err}");
        }
    });
    (addr, state)
}

/// Polls `url` until it answers with `status`.
pub async fn wait_for_status(client: &reqwest::Client, url: &str, status: u16) {
    for _ in 0..100 {
        if let Ok(resp) = client.get(url).send().await
            && resp.status().as_u16() == status
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{url} never answered {status}");
}
