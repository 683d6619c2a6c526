//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use relay_proxy::{ProxyConfig, ProxyServer, Shutdown};

/// Start a path-aware mock backend. The closure receives the request path
/// and returns `(status, body)`.
pub async fn start_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let mut read_total = 0;
                        loop {
                            match socket.read(&mut buf[read_total..]).await {
                                Ok(0) => break,
                                Ok(n) => {
                                    read_total += n;
                                    if buf[..read_total].windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                    if read_total == buf.len() {
                                        break;
                                    }
                                }
                                Err(_) => return,
                            }
                        }

                        let head = String::from_utf8_lossy(&buf[..read_total]);
                        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

                        let (status, body) = f(path).await;
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a mock backend that answers the health probe and echoes `name` on
/// every other path.
pub async fn start_healthy_backend(addr: SocketAddr, name: &'static str) {
    start_backend(addr, move |path| async move {
        if path == "/healthCheck" {
            (200, r#"{"Status": 200}"#.to_string())
        } else {
            (200, name.to_string())
        }
    })
    .await;
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Spawn the proxy on `addr` and hand back its shutdown signal.
pub async fn start_proxy(config: ProxyConfig, addr: SocketAddr) -> Shutdown {
    let shutdown = Shutdown::new();

    let server = ProxyServer::new(config);
    let listener = TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Let the acceptor and any static snapshot installs settle.
    tokio::time::sleep(Duration::from_millis(200)).await;

    shutdown
}
