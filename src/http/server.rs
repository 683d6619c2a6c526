//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Classify requests as plain HTTP or WebSocket upgrades
//! - Drive the HTTP admission path for plain requests
//! - Start the per-class health monitors (or install static snapshots)
//! - Serve with graceful shutdown

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{Algorithm, ProxyConfig};
use crate::health::HealthMonitor;
use crate::http::response::{json_error, json_response};
use crate::http::{websocket, worker};
use crate::lifecycle::{Shutdown, DRAIN_GRACE};
use crate::load_balancer::backend::ProxyRequest;
use crate::load_balancer::{HealthyPool, HttpBackend, RequestIdCounter, WsBackend};

/// Routing state for the HTTP traffic class.
pub struct HttpClass {
    pub backends: Vec<Arc<HttpBackend>>,
    pub pool: Arc<HealthyPool<HttpBackend>>,
    pub request_ids: RequestIdCounter,
    pub algorithm: Algorithm,
    pub enable_health_check: bool,
    pub health_check_interval: Duration,
}

/// Routing state for the WebSocket traffic class.
pub struct WsClass {
    pub backends: Vec<Arc<WsBackend>>,
    pub pool: Arc<HealthyPool<WsBackend>>,
    pub connection_ids: RequestIdCounter,
    pub algorithm: Algorithm,
    pub enable_health_check: bool,
    pub health_check_interval: Duration,
}

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    http: Arc<HttpClass>,
    websocket: Option<Arc<WsClass>>,
}

/// The reverse proxy frontend.
pub struct ProxyServer {
    router: Router,
    state: AppState,
}

impl ProxyServer {
    /// Build the proxy from validated configuration.
    ///
    /// Spawns each HTTP backend's initial workers; must run inside a Tokio
    /// runtime.
    pub fn new(config: ProxyConfig) -> Self {
        let http = Arc::new(HttpClass {
            backends: config.http.backends.iter().map(HttpBackend::start).collect(),
            pool: Arc::new(HealthyPool::new()),
            request_ids: RequestIdCounter::new(),
            algorithm: config.http.algorithm,
            enable_health_check: config.http.enable_health_check,
            health_check_interval: Duration::from_secs(config.http.health_check_interval),
        });

        let websocket = config.websocket.as_ref().map(|section| {
            Arc::new(WsClass {
                backends: section.backends.iter().map(WsBackend::new).collect(),
                pool: Arc::new(HealthyPool::new()),
                connection_ids: RequestIdCounter::new(),
                algorithm: section.algorithm,
                enable_health_check: section.enable_health_check,
                health_check_interval: Duration::from_secs(section.health_check_interval),
            })
        });

        let state = AppState { http, websocket };
        let router = Self::build_router(state.clone());

        Self { router, state }
    }

    /// Build the Axum router with the catch-all proxy handler.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires.
    ///
    /// Starts the health monitors first so routing has a snapshot to work
    /// with; classes with health checking disabled route to their full
    /// configured pool, ordered by id. After the trigger, in-flight
    /// exchanges get [`DRAIN_GRACE`] to finish before the server gives up
    /// on them.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "proxy listening");

        let http = &self.state.http;
        if http.enable_health_check {
            let monitor = HealthMonitor::new(
                http.backends.clone(),
                http.pool.clone(),
                http.algorithm,
                http.health_check_interval,
            );
            tokio::spawn(monitor.run());
        } else {
            http.pool.install(http.backends.clone()).await;
        }

        if let Some(ws) = &self.state.websocket {
            if ws.enable_health_check {
                let monitor = HealthMonitor::new(
                    ws.backends.clone(),
                    ws.pool.clone(),
                    ws.algorithm,
                    ws.health_check_interval,
                );
                tokio::spawn(monitor.run());
            } else {
                ws.pool.install(ws.backends.clone()).await;
            }
        }

        let signal = shutdown.clone();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                signal.wait().await;
                tracing::info!("shutdown signal received");
            })
            .into_future();

        tokio::select! {
            result = serve => result?,
            () = shutdown.drain_deadline() => {
                tracing::warn!(
                    grace_secs = DRAIN_GRACE.as_secs(),
                    "drain deadline reached, abandoning remaining connections"
                );
            }
        }

        tracing::info!("proxy stopped");
        Ok(())
    }
}

/// True iff the request asks for a WebSocket upgrade:
/// `Connection: Upgrade` and `Upgrade: websocket`.
fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_is_upgrade = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("upgrade"))
        .unwrap_or(false);
    let upgrade_is_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    connection_is_upgrade && upgrade_is_websocket
}

/// Catch-all handler: classify, route, and answer.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    if is_websocket_upgrade(request.headers()) {
        let Some(ws_class) = state.websocket.clone() else {
            return json_error(
                StatusCode::BAD_REQUEST,
                "proxy not configured to handle websocket connections",
            );
        };
        return websocket::handle_upgrade(ws_class, request).await;
    }

    forward_http(&state, request).await
}

/// Plain-HTTP path: buffer the request, route it, run the admission path.
async fn forward_http(state: &AppState, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(%error, "failed to buffer request body");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };

    let proxy_request = ProxyRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body,
    };

    let request_id = state.http.request_ids.next();
    let Some(backend) = state.http.pool.select(request_id).await else {
        tracing::warn!(request_id, "no healthy http backends");
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "no healthy backends");
    };

    tracing::debug!(
        request_id,
        backend_id = backend.id,
        path = %proxy_request.path,
        "forwarding request"
    );

    let (status, body) = worker::dispatch(&backend, proxy_request).await;
    json_response(status, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(connection: Option<&str>, upgrade: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(value) = connection {
            map.insert(header::CONNECTION, HeaderValue::from_str(value).unwrap());
        }
        if let Some(value) = upgrade {
            map.insert(header::UPGRADE, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn classifies_websocket_upgrades() {
        assert!(is_websocket_upgrade(&headers(
            Some("Upgrade"),
            Some("websocket")
        )));
        assert!(is_websocket_upgrade(&headers(
            Some("upgrade"),
            Some("WebSocket")
        )));
    }

    #[test]
    fn plain_requests_are_not_upgrades() {
        assert!(!is_websocket_upgrade(&headers(None, None)));
        assert!(!is_websocket_upgrade(&headers(Some("keep-alive"), None)));
        assert!(!is_websocket_upgrade(&headers(
            Some("Upgrade"),
            Some("h2c")
        )));
        assert!(!is_websocket_upgrade(&headers(None, Some("websocket"))));
    }
}
