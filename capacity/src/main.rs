use anyhow::{bail, Context, Result};
use clap::Parser;
use matchpoint_capacity::{CapacityProvider, Config, InMemoryBackend};
use matchpoint_store::Store;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "matchpoint session-pool autoscaler", long_about = None)]
struct Args {
    /// Store location; defaults to REDIS_URL / REDIS_HOST:REDIS_PORT.
    #[arg(long)]
    redis_url: Option<String>,

    /// Provisioning backend. `memory` is the in-process fake; hypervisor
    /// backends ship separately and plug in here.
    #[arg(long, default_value = "memory")]
    backend: String,
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

    let cfg = Config::from_env();
    match args.backend.as_str() {
        "memory" => {
            CapacityProvider::new(store, InMemoryBackend::new(), cfg)
                .run()
                .await
        }
        other => bail!("unknown capacity backend: {other}"),
    }
    Ok(())
}
