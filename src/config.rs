//! Service configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). Unset or unparsable numeric values fall back to defaults;
//! an unparsable `LISTEN_ADDR` is an error.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::schema::cache::DEFAULT_CACHE_ROOT;
use crate::tx::notify::{DEFAULT_NOTIFICATION_QUEUE_CAPACITY, DEFAULT_NOTIFICATION_WORKERS};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level service configuration.
///
/// Loaded once at startup via [`MountCacheConfig::from_env`].
#[derive(Debug, Clone)]
pub struct MountCacheConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,

    /// Root of the on-disk schema cache.
    pub schema_cache_root: PathBuf,

    /// Concurrently running commit notifications.
    pub notification_workers: usize,

    /// Commit notifications allowed to wait for a worker.
    pub notification_queue_capacity: usize,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Capacity of the topology change channel.
    pub topology_channel_capacity: usize,

    /// Per-request timeout of the HTTP layer.
    pub request_timeout: Duration,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for MountCacheConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8181)),
            schema_cache_root: PathBuf::from(DEFAULT_CACHE_ROOT),
            notification_workers: DEFAULT_NOTIFICATION_WORKERS,
            notification_queue_capacity: DEFAULT_NOTIFICATION_QUEUE_CAPACITY,
            event_bus_capacity: 10_000,
            topology_channel_capacity: 256,
            request_timeout: Duration::from_secs(30),
            log_format: LogFormat::Text,
        }
    }
}

impl MountCacheConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid LISTEN_ADDR {raw:?}"))?,
            None => defaults.listen_addr,
        };

        let schema_cache_root = lookup("SCHEMA_CACHE_ROOT")
            .filter(|v| !v.is_empty())
            .map_or(defaults.schema_cache_root, PathBuf::from);

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            schema_cache_root,
            notification_workers: parse_or(&lookup, "NOTIFICATION_WORKERS", defaults.notification_workers),
            notification_queue_capacity: parse_or(
                &lookup,
                "NOTIFICATION_QUEUE_CAPACITY",
                defaults.notification_queue_capacity,
            ),
            event_bus_capacity: parse_or(&lookup, "EVENT_BUS_CAPACITY", defaults.event_bus_capacity),
            topology_channel_capacity: parse_or(
                &lookup,
                "TOPOLOGY_CHANNEL_CAPACITY",
                defaults.topology_channel_capacity,
            ),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            log_format,
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<MountCacheConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        MountCacheConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let Ok(config) = config(&[]) else {
            panic!("defaults should load");
        };
        assert_eq!(config.listen_addr.port(), 8181);
        assert_eq!(config.schema_cache_root, PathBuf::from("cache/cached-mountpoint"));
        assert_eq!(config.notification_workers, 20);
        assert_eq!(config.notification_queue_capacity, 1000);
        assert_eq!(config.event_bus_capacity, 10_000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let Ok(config) = config(&[("NOTIFICATION_WORKERS", "many"), ("LOG_FORMAT", "json")]) else {
            panic!("should load");
        };
        assert_eq!(config.notification_workers, 20);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_listen_addr_is_an_error() {
        assert!(config(&[("LISTEN_ADDR", "not-an-addr")]).is_err());
    }

    #[test]
    fn overrides_are_applied() {
        let Ok(config) = config(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("SCHEMA_CACHE_ROOT", "/var/cache/mounts"),
            ("TOPOLOGY_CHANNEL_CAPACITY", "8"),
        ]) else {
            panic!("should load");
        };
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.schema_cache_root, PathBuf::from("/var/cache/mounts"));
        assert_eq!(config.topology_channel_capacity, 8);
    }
}
