//! stationlink-service - background collector and HTTP API.
//!
//! Run with: `cargo run -p stationlink-service`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use stationlink_core::{BroadcastMessage, ConnectionManager, ConnectionStatus, LinkConfig};
use stationlink_service::{AppState, api, collector, ws};

/// Background collector and HTTP API for a stationlink sensor node.
#[derive(Parser, Debug)]
#[command(name = "stationlink-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Bind address.
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Serial port (overrides ARDUINO_PORT).
    #[arg(long)]
    port: Option<String>,

    /// Wi-Fi host (overrides WIFI_HOST).
    #[arg(long)]
    wifi_host: Option<String>,

    /// Disable the background collector (API only mode).
    #[arg(long)]
    no_collector: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stationlink_service=info".parse()?)
                .add_directive("stationlink_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = LinkConfig::from_env()?;
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if let Some(host) = args.wifi_host {
        config.wifi.host = host;
    }

    let manager = Arc::new(ConnectionManager::new(config.clone())?);

    // A node that is down at startup is not fatal; the collector keeps
    // retrying once it runs.
    match manager.connect().await {
        Ok(kind) => info!(transport = %kind, "initial connection established"),
        Err(e) => warn!(error = %e, "initial connection failed"),
    }

    let state = AppState::new(Arc::clone(&manager), config);

    // Push status samples to WebSocket clients alongside the readings.
    let status_state = Arc::clone(&state);
    state.monitor.add_callback(
        "broadcast",
        Arc::new(move |status: &ConnectionStatus| {
            status_state
                .distributor
                .publish(&BroadcastMessage::Status(status.clone()));
        }),
    );
    state.monitor.start().await;

    if args.no_collector {
        info!("background collector disabled");
    } else {
        collector::start(Arc::clone(&state));
    }

    let app = Router::new()
        .merge(api::router())
        .merge(ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = args.bind.parse()?;
    info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(manager))
        .await?;

    Ok(())
}

async fn shutdown_signal(manager: Arc<ConnectionManager>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    manager.shutdown().await;
}
