//! Periodic health checker.
//!
//! # Responsibilities
//! - Probe every configured backend on a fixed cadence
//! - Rebuild the healthy snapshot from the probe verdicts
//! - Install the snapshot atomically under the pool's write side

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Uri};
use http_body_util::BodyExt;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::config::Algorithm;
use crate::load_balancer::{backend::Endpoint, HealthyPool};
use crate::observability::metrics;

/// Budget for one probe: connect, request, and body read together.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Response schema of the backends' `/healthCheck` endpoint.
#[derive(Debug, Deserialize)]
struct HealthCheckResponse {
    #[serde(rename = "Status")]
    status: i64,
}

/// Periodic prober for one traffic class.
pub struct HealthMonitor<E> {
    /// Full configured pool, indexed by `id - 1`.
    backends: Vec<Arc<E>>,
    pool: Arc<HealthyPool<E>>,
    algorithm: Algorithm,
    interval: Duration,
    client: Client<HttpConnector, Body>,
}

impl<E: Endpoint> HealthMonitor<E> {
    pub fn new(
        backends: Vec<Arc<E>>,
        pool: Arc<HealthyPool<E>>,
        algorithm: Algorithm,
        interval: Duration,
    ) -> Self {
        Self {
            backends,
            pool,
            algorithm,
            interval,
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }

    /// Run forever: one probe cycle, then sleep the configured interval.
    pub async fn run(self) {
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Probe every backend once and install the resulting snapshot.
    pub async fn run_cycle(&self) {
        let total = self.backends.len();
        let (healthy_tx, mut healthy_rx) = mpsc::channel::<usize>(total.max(1));
        let (unhealthy_tx, mut unhealthy_rx) = mpsc::channel::<usize>(total.max(1));

        for backend in &self.backends {
            let client = self.client.clone();
            let id = backend.id();
            let addr = backend.addr().to_string();
            let healthy_tx = healthy_tx.clone();
            let unhealthy_tx = unhealthy_tx.clone();
            tokio::spawn(async move {
                if probe(&client, &addr).await {
                    let _ = healthy_tx.send(id).await;
                } else {
                    let _ = unhealthy_tx.send(id).await;
                }
            });
        }
        drop(healthy_tx);
        drop(unhealthy_tx);

        // Every probe reports exactly once, so this loop always terminates.
        let mut healthy_ids = Vec::with_capacity(total);
        let mut responded = 0;
        while responded < total {
            tokio::select! {
                Some(id) = healthy_rx.recv() => {
                    healthy_ids.push(id);
                    responded += 1;
                }
                Some(id) = unhealthy_rx.recv() => {
                    tracing::debug!(backend_id = id, "backend failed health check");
                    metrics::record_backend_health(id, false);
                    responded += 1;
                }
            }
        }

        // Sorting by id is what makes round-robin rotation stable across
        // cycles with an unchanged healthy set. Random keeps arrival order.
        if self.algorithm == Algorithm::RoundRobin {
            healthy_ids.sort_unstable();
        }

        tracing::info!(
            healthy = healthy_ids.len(),
            configured = total,
            "health check cycle finished"
        );

        let snapshot: Vec<Arc<E>> = healthy_ids
            .iter()
            .map(|&id| self.backends[id - 1].clone())
            .collect();
        for backend in &snapshot {
            metrics::record_backend_health(backend.id(), true);
        }

        self.pool.install(snapshot).await;
    }
}

/// One probe: `GET http://<addr>/healthCheck` under [`PROBE_TIMEOUT`].
///
/// Healthy iff the request succeeds, the body decodes as
/// `{"Status": int}`, and the status field is 200. Everything else,
/// including a transport timeout, is unhealthy.
async fn probe(client: &Client<HttpConnector, Body>, addr: &str) -> bool {
    match tokio::time::timeout(PROBE_TIMEOUT, probe_once(client, addr)).await {
        Ok(verdict) => verdict,
        Err(_) => {
            tracing::debug!(addr, "health probe timed out");
            false
        }
    }
}

async fn probe_once(client: &Client<HttpConnector, Body>, addr: &str) -> bool {
    let uri: Uri = match format!("http://{}/healthCheck", addr).parse() {
        Ok(uri) => uri,
        Err(error) => {
            tracing::warn!(addr, %error, "invalid health check address");
            return false;
        }
    };

    let request = match Request::get(uri).body(Body::empty()) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(addr, %error, "failed to build health check request");
            return false;
        }
    };

    let response = match client.request(request).await {
        Ok(response) => response,
        Err(error) => {
            tracing::debug!(addr, %error, "health probe request failed");
            return false;
        }
    };

    let body = match response.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            tracing::debug!(addr, %error, "failed to read health probe body");
            return false;
        }
    };

    match serde_json::from_slice::<HealthCheckResponse>(&body) {
        Ok(parsed) => parsed.status == 200,
        Err(error) => {
            tracing::debug!(addr, %error, "health probe body did not decode");
            false
        }
    }
}
