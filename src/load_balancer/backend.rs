//! Backend descriptors.
//!
//! # Responsibilities
//! - Represent a single upstream server for each traffic class
//! - Hold the HTTP backend's mutable worker-pool state: the bounded job
//!   channel and the guarded worker count
//! - Spawn the initial worker set at configuration time

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::config::{HttpBackendConfig, WsBackendConfig};
use crate::http::worker;

/// Depth of each backend's bounded job channel.
pub const JOB_CHANNEL_CAPACITY: usize = 10;

/// Common surface the health checker and pool need from a backend.
pub trait Endpoint: Send + Sync + 'static {
    /// Stable 1-origin id assigned at configuration time.
    fn id(&self) -> usize;
    /// Network address as `host:port`.
    fn addr(&self) -> &str;
}

/// A buffered client request, detached from the connection it arrived on.
///
/// Workers replay the body bytes verbatim; headers are forwarded without
/// hop-by-hop stripping.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The terminal outcome of a job: upstream status plus the full body.
pub type JobOutcome = (StatusCode, Bytes);

/// A unit of work queued for a backend's worker pool.
///
/// The oneshot sender doubles as response sink and completion signal:
/// workers send on it exactly once on every path, and if a worker dies the
/// dropped sender errors out the waiting admission path instead of
/// blocking it.
#[derive(Debug)]
pub struct Job {
    pub request: ProxyRequest,
    pub respond_to: oneshot::Sender<JobOutcome>,
}

/// A single HTTP backend with its elastic worker pool state.
#[derive(Debug)]
pub struct HttpBackend {
    pub id: usize,
    pub addr: String,

    pub min_workers: usize,
    pub max_workers: usize,
    /// How long a worker may sit without a job before it may exit.
    pub idle_timeout: Duration,

    /// Current worker count. Guarded separately from the job channel so the
    /// admission path can decide to grow without touching the queue.
    pub worker_count: Mutex<usize>,

    pub jobs_tx: mpsc::Sender<Job>,
    /// Workers contend on this receiver; FIFO within the channel.
    pub jobs_rx: tokio::sync::Mutex<mpsc::Receiver<Job>>,
}

impl HttpBackend {
    /// Build the backend and spawn its initial `min_workers` workers.
    ///
    /// Must run inside a Tokio runtime.
    pub fn start(config: &HttpBackendConfig) -> Arc<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel(JOB_CHANNEL_CAPACITY);

        let backend = Arc::new(Self {
            id: config.id,
            addr: config.addr.clone(),
            min_workers: config.min_workers,
            max_workers: config.max_workers,
            idle_timeout: config.idle_timeout(),
            worker_count: Mutex::new(config.min_workers),
            jobs_tx,
            jobs_rx: tokio::sync::Mutex::new(jobs_rx),
        });

        for worker_id in 1..=config.min_workers {
            tracing::debug!(
                backend_id = backend.id,
                worker_id,
                "spawning initial worker"
            );
            worker::spawn_worker(backend.clone(), worker_id);
        }

        backend
    }

    /// Snapshot of the current worker count.
    pub fn current_workers(&self) -> usize {
        *self.worker_count.lock().expect("worker count lock poisoned")
    }
}

impl Endpoint for HttpBackend {
    fn id(&self) -> usize {
        self.id
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

/// A single WebSocket backend. Relay sessions carry all per-connection
/// state themselves, so the descriptor is just an identity.
#[derive(Debug)]
pub struct WsBackend {
    pub id: usize,
    pub addr: String,
}

impl WsBackend {
    pub fn new(config: &WsBackendConfig) -> Arc<Self> {
        Arc::new(Self {
            id: config.id,
            addr: config.addr.clone(),
        })
    }
}

impl Endpoint for WsBackend {
    fn id(&self) -> usize {
        self.id
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}
