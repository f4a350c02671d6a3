use std::time::Duration;

/// Session-runner tuning, environment-level.
#[derive(Debug, Clone)]
pub struct Config {
    /// Concurrent games this runner serves.
    pub max_slots: u32,
    pub poll: Duration,
    pub finish_lock_ttl_ms: u64,
    pub player_ttl_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_slots: 5,
            poll: Duration::from_millis(500),
            finish_lock_ttl_ms: 5_000,
            player_ttl_s: 600,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_slots: read_u64("SESSION_MAX_SLOTS", defaults.max_slots as u64) as u32,
            poll: Duration::from_millis(read_u64("SESSION_POLL_MS", 500)),
            finish_lock_ttl_ms: read_u64("FINISH_LOCK_TTL_MS", defaults.finish_lock_ttl_ms),
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
