//! Thermometry agent serving fake Lakeshore readings over a websocket.
//!
//! Run with: cargo run -p thermometry-agent
//!
//! Then connect to ws://127.0.0.1:3000/ws and send
//! `{"type": "op", "action": "start", "op_name": "acq"}`.
//!
//! The runtime reads `AGENT_*` variables (`AGENT_ADDRESS`,
//! `AGENT_EXIT_WHEN_IDLE`, ...); `AGENT_LISTEN` sets the bind address.

mod thermometry;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context as _;
use instrument_agent_runtime::{AgentConfig, AgentHandle, AgentRuntime};
use instrument_agent_transport::websocket::create_ws_router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::thermometry::Thermometry;

const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AgentConfig::from_env().context("Failed to read agent configuration")?;

    let mut runtime = AgentRuntime::new(config);
    Arc::new(Thermometry::new(Duration::from_millis(10))).register(&mut runtime);
    let agent = runtime.start();

    let app = create_ws_router(Arc::new(agent.clone()));

    let addr: SocketAddr = std::env::var("AGENT_LISTEN")
        .unwrap_or_else(|_| DEFAULT_LISTEN.to_string())
        .parse()
        .context("Invalid AGENT_LISTEN address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let endpoints = agent.endpoints();
    tracing::info!(
        ops = %endpoints.ops(),
        management = %endpoints.management(),
        feed = %endpoints.feed(),
        "Agent listening on ws://{addr}/ws"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(agent.clone()))
        .await
        .context("Server error")?;

    agent.shutdown();
    let lifecycle = agent.lifecycle();
    tracing::info!(
        identity = ?lifecycle.identity(),
        active = lifecycle.active(),
        "Agent stopped"
    );
    Ok(())
}

async fn shutdown_signal(agent: AgentHandle) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!("Failed to listen for ctrl-c: {e}");
            }
        }
        () = agent.closed() => {}
    }
    tracing::info!("Shutting down");
}
