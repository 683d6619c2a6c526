//! A tiny backend for driving the proxy by hand: answers the health probe
//! and echoes everything else.
//!
//! ```text
//! cargo run --example mock_backend -- 9001
//! ```

use axum::http::Uri;
use axum::routing::{any, get};
use axum::{Json, Router};
use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(9001);

    let echo = move |uri: Uri| async move {
        Json(serde_json::json!({ "port": port, "path": uri.path() }))
    };

    let app = Router::new()
        .route(
            "/healthCheck",
            get(|| async { Json(serde_json::json!({ "Status": 200 })) }),
        )
        .route("/", any(echo))
        .route("/{*path}", any(echo));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("mock backend listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
