use anyhow::{Context, Result};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use matchpoint_gateway::connection::handle_socket;
use matchpoint_gateway::events::spawn_event_forwarder;
use matchpoint_gateway::{Config, Gateway};
use matchpoint_store::Store;
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "matchpoint player gateway", long_about = None)]
struct Args {
    /// Store location; defaults to REDIS_URL / REDIS_HOST:REDIS_PORT.
    #[arg(long)]
    redis_url: Option<String>,

    /// Bind port override; defaults to GATEWAY_PORT.
    #[arg(short, long)]
    port: Option<u16>,
}

async fn ws_handler(
    AxumState(gateway): AxumState<Gateway>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, gateway))
}

async fn healthz() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();
    let url = args.redis_url.unwrap_or_else(matchpoint_store::url_from_env);
    let store = Store::connect(&url)
        .await
        .with_context(|| format!("failed to connect to store at {url}"))?;
    info!(%url, "connected to coordination store");

    let mut cfg = Config::from_env();
    if let Some(port) = args.port {
        cfg.port = port;
    }
    let gateway = Gateway::new(store, cfg.clone());
    spawn_event_forwarder(gateway.clone());

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(gateway);

    let addr = SocketAddr::new(cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
