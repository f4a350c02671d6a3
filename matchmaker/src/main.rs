use anyhow::{Context, Result};
use clap::Parser;
use matchpoint_matchmaker::{Config, Matchmaker};
use matchpoint_store::Store;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "matchpoint batch former", long_about = None)]
struct Args {
    /// Store location; defaults to REDIS_URL / REDIS_HOST:REDIS_PORT.
    #[arg(long)]
    redis_url: Option<String>,

    /// Stable instance identity used as the advisory-lock token.
    #[arg(long)]
    instance_id: Option<String>,
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

    let instance_id = args
        .instance_id
        .unwrap_or_else(|| format!("matchmaker-{}", uuid::Uuid::new_v4()));
    let cfg = Config::from_env();
    Matchmaker::new(store, cfg, instance_id).run().await;
    Ok(())
}
