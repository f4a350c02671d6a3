use std::net::IpAddr;
use std::time::Duration;

/// Gateway tuning, environment-level.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Window a fresh connection has to complete the HELLO handshake.
    pub hello_timeout: Duration,
    pub player_ttl_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            hello_timeout: Duration::from_millis(10_000),
            player_ttl_s: 600,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("GATEWAY_HOST")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.host),
            port: std::env::var("GATEWAY_PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.port),
            hello_timeout: Duration::from_millis(read_u64("HELLO_TIMEOUT_MS", 10_000)),
            player_ttl_s: read_u64("PLAYER_TTL_S", defaults.player_ttl_s),
        }
    }
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}
