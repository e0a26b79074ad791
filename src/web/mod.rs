// Health server — liveness endpoint for the hosting platform.
//
// GET /health always answers 200 while the process is up; the body carries
// the poll loop's progress signal so an operator can tell "alive" from
// "alive and keeping up". GET / identifies the service.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::status::{format_time, BotHealth};

/// Build the router. Split out from `serve_health` so tests can drive it
/// without binding a socket.
pub fn build_router(health: BotHealth) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(index))
        .layer(TraceLayer::new_for_http())
        .with_state(health)
}

/// Serve the health endpoint until `shutdown` fires.
pub async fn serve_health(
    health: BotHealth,
    bind: &str,
    port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("Invalid health check address {bind}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health check server on {addr}"))?;
    info!("Health check listening on http://{addr}/health");

    axum::serve(listener, build_router(health))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Health check server failed")?;
    Ok(())
}

async fn health_check(State(health): State<BotHealth>) -> impl IntoResponse {
    let status = health.snapshot().await;
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "running": status.running,
            "started_at": format_time(&status.started_at),
            "last_successful_poll": status.last_successful_poll.as_ref().map(format_time),
            "consecutive_poll_failures": status.consecutive_poll_failures,
            "mentions_replied": status.mentions_replied,
            "mentions_failed": status.mentions_failed,
            "last_error": status.last_error,
        })),
    )
}

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
