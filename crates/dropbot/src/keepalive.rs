//! Minimal HTTP endpoint for hosts that expect the process to listen on a port.

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::net::TcpListener;

const LIVENESS_TEXT: &str = "tubedrop is running";

pub fn router() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

async fn root_handler() -> &'static str {
    LIVENESS_TEXT
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Serves the keep-alive routes on an already bound listener.
pub async fn serve(listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Binds `0.0.0.0:<port>` and serves until the process exits.
pub async fn start_keepalive_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    log::info!("Keep-alive server listening on http://{}", addr);
    log::info!("  /        - liveness text");
    log::info!("  /health  - health check");

    serve(listener).await
}
