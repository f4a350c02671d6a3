use anyhow::{Context, Result};
use clap::Parser;
use matchpoint_runner::{resolve_session_id, Config, SessionRunner};
use matchpoint_store::Store;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "matchpoint session runner", long_about = None)]
struct Args {
    /// Store location; defaults to REDIS_URL / REDIS_HOST:REDIS_PORT.
    #[arg(long)]
    redis_url: Option<String>,

    /// Stable session identity; falls back to SESSION_ID, then a
    /// `session-*` hostname, then a fresh ID.
    #[arg(long)]
    session_id: Option<String>,
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

    let session_id = resolve_session_id(args.session_id.or_else(|| std::env::var("SESSION_ID").ok()));
    let cfg = Config::from_env();
    let runner = SessionRunner::start(store, cfg, session_id)
        .await
        .context("failed to register session")?;
    runner.run().await;
    Ok(())
}
