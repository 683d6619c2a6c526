//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("metrics server listening on http://{}", addr);
}

/// Record one forwarded HTTP request.
pub fn record_request(method: &str, status: u16, backend_id: usize, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend_id.to_string()),
    ];

    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

/// Update a backend's health gauge after a probe cycle.
pub fn record_backend_health(backend_id: usize, healthy: bool) {
    let value = if healthy { 1.0 } else { 0.0 };
    gauge!("proxy_backend_healthy", "backend" => backend_id.to_string()).set(value);
}

/// Track the number of live relay sessions per WebSocket backend.
pub fn record_websocket_session(backend_id: usize, delta: i64) {
    gauge!("proxy_websocket_sessions", "backend" => backend_id.to_string())
        .increment(delta as f64);
}
