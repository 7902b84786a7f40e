//! Daemon bootstrap: bind the gateway router, write a PID file, serve.
//!
//! Bind starting at a configured port with sequential fallback, write
//! `<id>.pid` so only one daemon instance runs at a time, then block on
//! `axum::serve`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::GatewayConfig;
use crate::rpc::Dispatcher;

use super::routes::health;
use super::ws::ws_handler;

pub type GatewayState = Arc<Dispatcher>;

/// Path to the PID file written on daemon start (`~/.mindmesh/daemon.pid`).
pub fn pid_path() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join(".mindmesh").join("daemon.pid")
}

/// Bind the gateway router per `config` and block serving it until
/// shutdown. Binds `127.0.0.1` starting at `config.bind_port`, trying up
/// to `config.max_port_attempts` sequential ports before giving up.
pub async fn run(dispatcher: Arc<Dispatcher>, config: &GatewayConfig) -> Result<(), String> {
    let state: GatewayState = dispatcher;

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = bind_with_fallback(&config.bind_host, config.bind_port, config.max_port_attempts).await?;
    let addr = listener.local_addr().map_err(|e| e.to_string())?;
    write_pid_file(addr.port())?;
    tracing::info!(%addr, "mindmesh gateway listening");

    axum::serve(listener, app).await.map_err(|e| format!("gateway error: {e}"))
}

async fn bind_with_fallback(host: &str, start_port: u16, max_attempts: u16) -> Result<TcpListener, String> {
    for offset in 0..max_attempts.max(1) {
        let port = start_port + offset;
        let addr: SocketAddr = format!("{host}:{port}").parse().map_err(|e| format!("invalid bind address: {e}"))?;
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(_) if offset + 1 < max_attempts => continue,
            Err(e) => {
                return Err(format!(
                    "could not bind to any port in {start_port}-{}: {e}",
                    start_port + max_attempts.saturating_sub(1)
                ));
            }
        }
    }
    Err("no ports configured to attempt".to_string())
}

fn write_pid_file(port: u16) -> Result<(), String> {
    let path = pid_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("failed to create state dir: {e}"))?;
    }
    std::fs::write(&path, format!("{}\n{}\n", std::process::id(), port))
        .map_err(|e| format!("failed to write PID file: {e}"))
}
