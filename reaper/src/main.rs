use anyhow::{Context, Result};
use clap::Parser;
use matchpoint_reaper::{Config, Reaper};
use matchpoint_store::Store;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "matchpoint stale-state sweeper", long_about = None)]
struct Args {
    /// Store location; defaults to REDIS_URL / REDIS_HOST:REDIS_PORT.
    #[arg(long)]
    redis_url: Option<String>,
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

    Reaper::new(store, Config::from_env()).run().await;
    Ok(())
}
