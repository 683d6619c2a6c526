//! Per-backend worker pool: admission control and the worker loop.
//!
//! # Responsibilities
//! - Enqueue jobs onto the backend's bounded channel, racing a backoff timer
//! - Grow the pool up to `max_workers` when the queue stays full
//! - Give up with 429 once the retry budget is spent
//! - Consume jobs, forward them upstream, and reap idle workers back down
//!   to `min_workers`
//!
//! # Backpressure
//! The bounded channel plus the exponential backoff ladder are the only
//! backpressure mechanism. A slow backend turns into client-visible 429s
//! after roughly 3.1 s of admission retries; there is no queue beyond the
//! channel depth.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode, Uri};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::oneshot;

use crate::http::response::error_payload;
use crate::load_balancer::backend::{HttpBackend, Job, JobOutcome, ProxyRequest};
use crate::observability::metrics;

/// Admission retry budget. Spent once per expired enqueue timer at the
/// worker-count ceiling.
const MAX_RETRIES: u32 = 5;

/// Delay for the enqueue-vs-grow race: 100, 200, 400, 800, 1600 ms.
fn retry_delay(retries_left: u32) -> Duration {
    Duration::from_millis(100u64 << (MAX_RETRIES - retries_left))
}

/// Admit a request to the backend's worker pool and wait for its outcome.
///
/// Each iteration races the enqueue against the current rung of the backoff
/// ladder. An expired timer is taken as queue saturation: the pool grows by
/// one worker if it may, otherwise a retry is spent. Once the job is
/// enqueued this waits for the worker's completion signal, so the response
/// is fully written before the admission path returns.
pub async fn dispatch(backend: &Arc<HttpBackend>, request: ProxyRequest) -> JobOutcome {
    let (respond_to, outcome_rx) = oneshot::channel();
    let mut job = Job {
        request,
        respond_to,
    };
    let mut retries_left = MAX_RETRIES;

    loop {
        match backend
            .jobs_tx
            .send_timeout(job, retry_delay(retries_left))
            .await
        {
            Ok(()) => {
                // A worker now owns the job; it signals exactly once.
                return match outcome_rx.await {
                    Ok(outcome) => outcome,
                    Err(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        error_payload("internal server error"),
                    ),
                };
            }
            Err(SendTimeoutError::Timeout(returned)) => {
                job = returned;
                tracing::debug!(
                    backend_id = backend.id,
                    retries_left,
                    "job queue full, attempting to grow worker pool"
                );

                let spawn_id = {
                    let mut count = backend
                        .worker_count
                        .lock()
                        .expect("worker count lock poisoned");
                    if *count == backend.max_workers {
                        retries_left -= 1;
                        tracing::debug!(backend_id = backend.id, "maximum worker count reached");
                        if retries_left == 0 {
                            return (
                                StatusCode::TOO_MANY_REQUESTS,
                                error_payload("Too Many Requests."),
                            );
                        }
                        None
                    } else {
                        *count += 1;
                        Some(*count)
                    }
                };

                if let Some(worker_id) = spawn_id {
                    spawn_worker(backend.clone(), worker_id);
                }
            }
            Err(SendTimeoutError::Closed(_)) => {
                // The receiver only closes if the backend itself is gone.
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_payload("internal server error"),
                );
            }
        }
    }
}

/// Spawn one worker task for the backend.
///
/// Workers race job arrival against the backend's idle timeout. An idle
/// worker exits only while the pool is above `min_workers`, checked under
/// the counter lock; dropping its client closes any idle upstream
/// connections.
pub fn spawn_worker(backend: Arc<HttpBackend>, worker_id: usize) {
    tokio::spawn(async move {
        let client: Client<HttpConnector, Body> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        tracing::debug!(backend_id = backend.id, worker_id, "worker started");

        loop {
            let next_job = async { backend.jobs_rx.lock().await.recv().await };
            match tokio::time::timeout(backend.idle_timeout, next_job).await {
                Ok(Some(job)) => {
                    let started = Instant::now();
                    let method = job.request.method.clone();
                    let (status, body) = forward(&client, &backend.addr, job.request).await;
                    metrics::record_request(method.as_str(), status.as_u16(), backend.id, started);
                    // The admission path may have given up; nothing to do then.
                    let _ = job.respond_to.send((status, body));
                }
                Ok(None) => {
                    // Channel closed: the backend is being torn down.
                    return;
                }
                Err(_) => {
                    let mut count = backend
                        .worker_count
                        .lock()
                        .expect("worker count lock poisoned");
                    if *count > backend.min_workers {
                        *count -= 1;
                        drop(count);
                        tracing::debug!(
                            backend_id = backend.id,
                            worker_id,
                            idle_secs = backend.idle_timeout.as_secs(),
                            "idle worker exiting"
                        );
                        return;
                    }
                }
            }
        }
    });
}

/// Forward one buffered request upstream and collect the full response.
///
/// Failures at any step collapse into a 500 with the standard error
/// envelope; the worker keeps running either way.
async fn forward(
    client: &Client<HttpConnector, Body>,
    addr: &str,
    request: ProxyRequest,
) -> JobOutcome {
    match try_forward(client, addr, request).await {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::warn!(addr, %error, "forwarding request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_payload("internal server error"),
            )
        }
    }
}

async fn try_forward(
    client: &Client<HttpConnector, Body>,
    addr: &str,
    request: ProxyRequest,
) -> Result<JobOutcome, ForwardError> {
    let uri: Uri = format!("http://{}{}", addr, request.path)
        .parse()
        .map_err(ForwardError::Uri)?;

    let mut upstream = Request::builder()
        .method(request.method)
        .uri(uri)
        .body(Body::from(request.body))
        .map_err(ForwardError::Build)?;
    // Headers are copied verbatim; no hop-by-hop stripping.
    *upstream.headers_mut() = request.headers;

    let response = client.request(upstream).await.map_err(ForwardError::Send)?;
    let status = response.status();
    let body: Bytes = response
        .into_body()
        .collect()
        .await
        .map_err(ForwardError::Read)?
        .to_bytes();

    Ok((status, body))
}

/// Error type for a single forwarding attempt.
#[derive(Debug)]
enum ForwardError {
    Uri(axum::http::uri::InvalidUri),
    Build(axum::http::Error),
    Send(hyper_util::client::legacy::Error),
    Read(hyper::Error),
}

impl std::fmt::Display for ForwardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardError::Uri(e) => write!(f, "invalid upstream uri: {}", e),
            ForwardError::Build(e) => write!(f, "failed to build upstream request: {}", e),
            ForwardError::Send(e) => write!(f, "upstream request failed: {}", e),
            ForwardError::Read(e) => write!(f, "failed to read upstream body: {}", e),
        }
    }
}

impl std::error::Error for ForwardError {}
