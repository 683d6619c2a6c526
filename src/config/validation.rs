//! Configuration validation logic.

use crate::config::schema::ProxyConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a ProxyConfig for semantic correctness.
///
/// All problems are collected so an operator sees every mistake at once
/// rather than fixing them one restart at a time.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.frontend.host.is_empty() {
        errors.push(ValidationError("frontend.host cannot be empty".to_string()));
    }

    // 1. HTTP backends: contiguous 1-origin ids, sane worker bounds.
    if config.http.backends.is_empty() {
        errors.push(ValidationError(
            "http section must configure at least one backend".to_string(),
        ));
    }
    for (index, backend) in config.http.backends.iter().enumerate() {
        if backend.id != index + 1 {
            errors.push(ValidationError(format!(
                "http backend ids must be contiguous from 1, expected server{} but found server{}",
                index + 1,
                backend.id
            )));
        }
        if backend.addr.is_empty() {
            errors.push(ValidationError(format!(
                "value of server{}_addr cannot be empty",
                backend.id
            )));
        }
        if backend.min_workers == 0 {
            errors.push(ValidationError(format!(
                "server{}_min_workers must be at least 1",
                backend.id
            )));
        }
        if backend.min_workers > backend.max_workers {
            errors.push(ValidationError(format!(
                "server{}_min_workers ({}) exceeds server{}_max_workers ({})",
                backend.id, backend.min_workers, backend.id, backend.max_workers
            )));
        }
    }

    // 2. WebSocket backends: same id discipline, no worker state to check.
    if let Some(websocket) = &config.websocket {
        if websocket.backends.is_empty() {
            errors.push(ValidationError(
                "websocket section must configure at least one backend".to_string(),
            ));
        }
        for (index, backend) in websocket.backends.iter().enumerate() {
            if backend.id != index + 1 {
                errors.push(ValidationError(format!(
                    "websocket backend ids must be contiguous from 1, expected server{} but found server{}",
                    index + 1,
                    backend.id
                )));
            }
            if backend.addr.is_empty() {
                errors.push(ValidationError(format!(
                    "value of websocket server{} cannot be empty",
                    backend.id
                )));
            }
        }
        if websocket.enable_health_check && websocket.health_check_interval == 0 {
            errors.push(ValidationError(
                "websocket.health_check_interval must be at least 1 second".to_string(),
            ));
        }
    }

    if config.http.enable_health_check && config.http.health_check_interval == 0 {
        errors.push(ValidationError(
            "http.health_check_interval must be at least 1 second".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::*;

    fn base_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.http.backends.push(HttpBackendConfig::new(1, "127.0.0.1:9001"));
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn rejects_gap_in_ids() {
        let mut config = base_config();
        config.http.backends.push(HttpBackendConfig::new(3, "127.0.0.1:9003"));

        let errs = validate_config(&config).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].0.contains("contiguous"));
    }

    #[test]
    fn rejects_inverted_worker_bounds() {
        let mut config = base_config();
        config.http.backends[0].min_workers = 5;
        config.http.backends[0].max_workers = 2;

        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("exceeds")));
    }

    #[test]
    fn collects_every_error() {
        let mut config = base_config();
        config.frontend.host = String::new();
        config.http.backends[0].addr = String::new();
        config.http.backends[0].min_workers = 0;

        let errs = validate_config(&config).unwrap_err();
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn rejects_empty_websocket_pool() {
        let mut config = base_config();
        config.websocket = Some(WebsocketConfig::default());

        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("websocket")));
    }
}
