//! # Drawbridge
//!
//! Backend core of the collaborative diagram workstation. Hosts the Canvas
//! State Service (REST + WebSocket) and the AI tool gateway on one localhost
//! listener, and supervises the optional stdio MCP sibling.

use std::net::SocketAddr;

use drawbridge_mcp::{ChildSupervisor, SupervisorConfig};
use drawbridge_server::{build_router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default port for the canvas state service.
const DEFAULT_PORT: u16 = 3100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "drawbridge=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = std::env::var("CANVAS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let state = AppState::new();
    let app = build_router(state);

    let supervisor = ChildSupervisor::new(SupervisorConfig::for_port(port));
    supervisor.start();

    // Bind to localhost ONLY (single-user security posture).
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("canvas state service listening on http://{addr}");
    tracing::info!("WebSocket endpoint at ws://{addr}/ws, tool gateway at /mcp");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
