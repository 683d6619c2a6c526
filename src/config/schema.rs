//! Configuration schema definitions.
//!
//! These are the *resolved* types the rest of the proxy consumes. The raw
//! `server<N>_addr`-style keys of the config file are folded into the
//! backend vectors by the loader.

use std::time::Duration;

use serde::Deserialize;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Frontend bind address.
    pub frontend: FrontendConfig,

    /// HTTP traffic class: algorithm, health checking, backend pool.
    pub http: HttpConfig,

    /// WebSocket traffic class. Absent means upgrade requests are refused.
    pub websocket: Option<WebsocketConfig>,

    /// Metrics exposition settings.
    pub observability: ObservabilityConfig,
}

/// Frontend listener configuration. Both fields are required.
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    pub host: String,
    pub port: u16,
}

impl FrontendConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Backend selection strategy.
///
/// Both strategies index the healthy snapshot by `request_id mod len`; they
/// differ only in how the health checker orders the snapshot (sorted by id
/// for round-robin, probe-arrival order for random).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    RoundRobin,
    #[default]
    Random,
}

/// HTTP traffic class configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub algorithm: Algorithm,
    pub enable_health_check: bool,
    pub health_check_interval: u64,
    pub backends: Vec<HttpBackendConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            enable_health_check: false,
            health_check_interval: defaults::HEALTH_CHECK_INTERVAL_SECS,
            backends: Vec::new(),
        }
    }
}

/// A single HTTP backend, folded from `server<id>_*` keys.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Stable 1-origin id; ids are contiguous across the section.
    pub id: usize,
    pub addr: String,
    pub min_workers: usize,
    pub max_workers: usize,
    /// Worker idle timeout in seconds.
    pub worker_timeout: u64,
}

impl HttpBackendConfig {
    pub fn new(id: usize, addr: impl Into<String>) -> Self {
        Self {
            id,
            addr: addr.into(),
            min_workers: defaults::MIN_WORKERS,
            max_workers: defaults::MAX_WORKERS,
            worker_timeout: defaults::WORKER_TIMEOUT_SECS,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout)
    }
}

/// WebSocket traffic class configuration.
#[derive(Debug, Clone)]
pub struct WebsocketConfig {
    pub algorithm: Algorithm,
    pub enable_health_check: bool,
    pub health_check_interval: u64,
    pub backends: Vec<WsBackendConfig>,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            enable_health_check: false,
            health_check_interval: defaults::HEALTH_CHECK_INTERVAL_SECS,
            backends: Vec::new(),
        }
    }
}

/// A single WebSocket backend, folded from `server<id>` keys.
#[derive(Debug, Clone)]
pub struct WsBackendConfig {
    pub id: usize,
    pub addr: String,
}

/// Metrics exposition settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Default values for optional backend keys.
pub mod defaults {
    pub const MIN_WORKERS: usize = 1;
    pub const MAX_WORKERS: usize = 3;
    pub const WORKER_TIMEOUT_SECS: u64 = 10;
    pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 10;
}
