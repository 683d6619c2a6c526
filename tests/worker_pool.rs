//! Worker pool integration tests: elastic growth and saturation.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use relay_proxy::config::{HttpBackendConfig, ProxyConfig};

mod common;

#[tokio::test]
async fn slow_backend_grows_the_pool_instead_of_429ing() {
    let backend_addr: SocketAddr = "127.0.0.1:29111".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29110".parse().unwrap();

    // Every request takes 400 ms, so one worker alone cannot keep up with a
    // burst of 13 and the admission timer must fire.
    common::start_backend(backend_addr, |_path| async {
        tokio::time::sleep(Duration::from_millis(400)).await;
        (200, "slow".to_string())
    })
    .await;

    let mut config = ProxyConfig::default();
    let mut backend = HttpBackendConfig::new(1, backend_addr.to_string());
    backend.min_workers = 1;
    backend.max_workers = 2;
    config.http.backends.push(backend);

    let shutdown = common::start_proxy(config, proxy_addr).await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .no_proxy()
        .build()
        .unwrap();

    let mut requests = Vec::new();
    for _ in 0..13 {
        let client = client.clone();
        let url = format!("http://{}/", proxy_addr);
        requests.push(tokio::spawn(async move {
            client.get(&url).send().await
        }));
    }

    for request in requests {
        let response = request.await.unwrap().expect("request failed");
        assert_eq!(response.status(), 200, "burst must complete without 429s");
        assert_eq!(response.text().await.unwrap(), "slow");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn saturated_pool_rejects_with_429_after_retry_budget() {
    let backend_addr: SocketAddr = "127.0.0.1:29121".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29120".parse().unwrap();

    // The single permitted worker is held far longer than the whole
    // admission backoff ladder.
    common::start_backend(backend_addr, |_path| async {
        tokio::time::sleep(Duration::from_secs(8)).await;
        (200, "eventually".to_string())
    })
    .await;

    let mut config = ProxyConfig::default();
    let mut backend = HttpBackendConfig::new(1, backend_addr.to_string());
    backend.min_workers = 1;
    backend.max_workers = 1;
    config.http.backends.push(backend);

    let shutdown = common::start_proxy(config, proxy_addr).await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .no_proxy()
        .build()
        .unwrap();

    // One request occupies the worker, ten more fill the job channel.
    for _ in 0..11 {
        let client = client.clone();
        let url = format!("http://{}/", proxy_addr);
        tokio::spawn(async move {
            let _ = client.get(&url).send().await;
        });
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The next request cannot enqueue, cannot grow the pool, and burns the
    // full backoff ladder (100+200+400+800+1600 ms) before giving up.
    let started = Instant::now();
    let response = client
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("proxy unreachable");
    let elapsed = started.elapsed();

    assert_eq!(response.status(), 429);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"error":"Too Many Requests."}"#
    );
    assert!(
        elapsed >= Duration::from_millis(3000),
        "rejection must come after the whole retry budget, took {:?}",
        elapsed
    );

    shutdown.trigger();
}
