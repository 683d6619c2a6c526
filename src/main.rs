//! Reverse proxy binary: load config, bind the frontend, serve until
//! interrupted.

use std::path::PathBuf;

use tokio::net::TcpListener;

use relay_proxy::config::load_config;
use relay_proxy::observability::{logging, metrics};
use relay_proxy::{ProxyServer, Shutdown};

const DEFAULT_CONFIG_PATH: &str = "relay-proxy.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = load_config(&config_path)?;
    tracing::info!(
        config = %config_path.display(),
        bind_address = %config.frontend.bind_address(),
        http_backends = config.http.backends.len(),
        websocket_backends = config
            .websocket
            .as_ref()
            .map(|ws| ws.backends.len())
            .unwrap_or(0),
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(error) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                %error,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.frontend.bind_address()).await?;

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.trigger();
        }
    });

    let server = ProxyServer::new(config);
    server.run(listener, shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
