//! Configuration loading from disk.
//!
//! The config file keeps the flat `server<id>_addr = "..."` key shape of the
//! original deployment format; this module folds those keys into the backend
//! vectors of [`ProxyConfig`] and hands the result to validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::schema::{
    defaults, Algorithm, FrontendConfig, HttpBackendConfig, HttpConfig, ObservabilityConfig,
    ProxyConfig, WebsocketConfig, WsBackendConfig,
};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// A malformed `server<id>_*` key or value.
    Section(String),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Section(msg) => write!(f, "Invalid config: {}", msg),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    let config = ProxyConfig {
        frontend: raw.frontend,
        http: resolve_http_section(raw.http)?,
        websocket: raw.websocket.map(resolve_websocket_section).transpose()?,
        observability: raw.observability,
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    frontend: FrontendConfig,
    http: RawClassSection,
    websocket: Option<RawClassSection>,
    #[serde(default)]
    observability: ObservabilityConfig,
}

/// One traffic-class section as it appears on disk: the three fixed keys
/// plus an arbitrary number of `server<id>*` keys captured by the flatten.
#[derive(Debug, Deserialize)]
struct RawClassSection {
    #[serde(default)]
    algorithm: Algorithm,
    #[serde(default)]
    enable_health_check: bool,
    #[serde(default = "default_health_check_interval")]
    health_check_interval: u64,
    #[serde(flatten)]
    servers: BTreeMap<String, toml::Value>,
}

fn default_health_check_interval() -> u64 {
    defaults::HEALTH_CHECK_INTERVAL_SECS
}

fn resolve_http_section(raw: RawClassSection) -> Result<HttpConfig, ConfigError> {
    let mut backends: BTreeMap<usize, HttpBackendConfig> = BTreeMap::new();

    for (key, value) in &raw.servers {
        let (id, field) = split_server_key(key, "http")?;
        let entry = backends
            .entry(id)
            .or_insert_with(|| HttpBackendConfig::new(id, ""));
        match field {
            "addr" => entry.addr = string_value(key, value)?,
            "min_workers" => entry.min_workers = integer_value(key, value)?,
            "max_workers" => entry.max_workers = integer_value(key, value)?,
            "worker_timeout" => entry.worker_timeout = integer_value(key, value)? as u64,
            other => {
                return Err(ConfigError::Section(format!(
                    "unknown key http.{}: expected addr/min_workers/max_workers/worker_timeout, got {:?}",
                    key, other
                )))
            }
        }
    }

    Ok(HttpConfig {
        algorithm: raw.algorithm,
        enable_health_check: raw.enable_health_check,
        health_check_interval: raw.health_check_interval,
        backends: backends.into_values().collect(),
    })
}

fn resolve_websocket_section(raw: RawClassSection) -> Result<WebsocketConfig, ConfigError> {
    let mut backends = Vec::new();

    for (key, value) in &raw.servers {
        let (id, field) = split_server_key(key, "websocket")?;
        if !field.is_empty() {
            return Err(ConfigError::Section(format!(
                "format for websocket section:\n\n[websocket]\nserver<id> = \"host:port\"\n\ngot key {:?}",
                key
            )));
        }
        backends.push(WsBackendConfig {
            id,
            addr: string_value(key, value)?,
        });
    }
    backends.sort_by_key(|b| b.id);

    Ok(WebsocketConfig {
        algorithm: raw.algorithm,
        enable_health_check: raw.enable_health_check,
        health_check_interval: raw.health_check_interval,
        backends,
    })
}

/// Split `server<id>_<field>` into its id and field name. The websocket
/// section uses bare `server<id>` keys, for which `field` is empty.
fn split_server_key<'a>(key: &'a str, section: &str) -> Result<(usize, &'a str), ConfigError> {
    let rest = key.strip_prefix("server").ok_or_else(|| {
        ConfigError::Section(format!(
            "format for {} section: server<id>_<field> = <value>, got key {:?}",
            section, key
        ))
    })?;

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let id: usize = rest[..digits_end].parse().map_err(|_| {
        ConfigError::Section(format!("{}.{} is missing a numeric server id", section, key))
    })?;

    let field = rest[digits_end..].strip_prefix('_').unwrap_or(&rest[digits_end..]);
    Ok((id, field))
}

fn string_value(key: &str, value: &toml::Value) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Section(format!("{} must be a string", key)))
}

fn integer_value(key: &str, value: &toml::Value) -> Result<usize, ConfigError> {
    value
        .as_integer()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ConfigError::Section(format!("{} must be a non-negative integer", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = parse_config(
            r#"
            [frontend]
            host = "0.0.0.0"
            port = 8080

            [http]
            algorithm = "round-robin"
            enable_health_check = true
            health_check_interval = 5
            server1_addr = "127.0.0.1:9001"
            server1_min_workers = 2
            server1_max_workers = 4
            server1_worker_timeout = 7
            server2_addr = "127.0.0.1:9002"

            [websocket]
            algorithm = "random"
            server1 = "127.0.0.1:9101"
            "#,
        )
        .unwrap();

        assert_eq!(config.frontend.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.http.algorithm, Algorithm::RoundRobin);
        assert!(config.http.enable_health_check);
        assert_eq!(config.http.health_check_interval, 5);

        assert_eq!(config.http.backends.len(), 2);
        let b1 = &config.http.backends[0];
        assert_eq!((b1.id, b1.addr.as_str()), (1, "127.0.0.1:9001"));
        assert_eq!((b1.min_workers, b1.max_workers, b1.worker_timeout), (2, 4, 7));

        // server2 picks up every default.
        let b2 = &config.http.backends[1];
        assert_eq!(b2.min_workers, defaults::MIN_WORKERS);
        assert_eq!(b2.max_workers, defaults::MAX_WORKERS);
        assert_eq!(b2.worker_timeout, defaults::WORKER_TIMEOUT_SECS);

        let ws = config.websocket.unwrap();
        assert_eq!(ws.algorithm, Algorithm::Random);
        assert_eq!(ws.backends.len(), 1);
        assert_eq!(ws.backends[0].addr, "127.0.0.1:9101");
    }

    #[test]
    fn websocket_section_is_optional() {
        let config = parse_config(
            r#"
            [frontend]
            host = "127.0.0.1"
            port = 8080

            [http]
            server1_addr = "127.0.0.1:9001"
            "#,
        )
        .unwrap();

        assert!(config.websocket.is_none());
        assert_eq!(config.http.algorithm, Algorithm::Random);
        assert!(!config.http.enable_health_check);
    }

    #[test]
    fn rejects_unknown_backend_field() {
        let err = parse_config(
            r#"
            [frontend]
            host = "127.0.0.1"
            port = 8080

            [http]
            server1_addr = "127.0.0.1:9001"
            server1_wrkrs = 3
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Section(_)));
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let err = parse_config(
            r#"
            [frontend]
            host = "127.0.0.1"
            port = 8080

            [http]
            algorithm = "least-connections"
            server1_addr = "127.0.0.1:9001"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_non_contiguous_ids() {
        let err = parse_config(
            r#"
            [frontend]
            host = "127.0.0.1"
            port = 8080

            [http]
            server1_addr = "127.0.0.1:9001"
            server3_addr = "127.0.0.1:9003"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
