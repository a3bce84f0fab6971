//! Session gateway - chat sessions in front of a question-answering service
//!
//! Receives messages from a chat platform, tracks per-sender sessions in a
//! relational store, and relays questions from active sessions to the
//! answer endpoint.

mod answer;
mod api;
mod app;
mod channel;
mod config;
mod db;
mod policy;
mod runtime;

use app::{shutdown_signal, AppContext};
use config::GatewayConfig;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_gateway=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    let ctx = AppContext::start(config).await?;
    let app = ctx.router();

    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.config().port));
    tracing::info!("Session gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ctx.shutdown().await;
    Ok(())
}
