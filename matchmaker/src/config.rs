use std::time::Duration;

/// Matchmaker tuning, environment-level.
#[derive(Debug, Clone)]
pub struct Config {
    /// Exact batch size N.
    pub players_per_game: usize,
    /// Hard pull cap per batch attempt is `players_per_game * max_pull_multiplier`.
    pub max_pull_multiplier: usize,
    pub match_min_seconds: u64,
    pub match_max_seconds: u64,
    /// Sleep when the queue holds fewer than N entries.
    pub idle: Duration,
    /// Sleep when no session has a free slot.
    pub no_capacity: Duration,
    pub lock_ttl_ms: u64,
    pub player_ttl_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            players_per_game: 100,
            max_pull_multiplier: 4,
            match_min_seconds: 30,
            match_max_seconds: 300,
            idle: Duration::from_millis(250),
            no_capacity: Duration::from_millis(500),
            lock_ttl_ms: 5_000,
            player_ttl_s: 600,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            players_per_game: read_usize("PLAYERS_PER_GAME", defaults.players_per_game),
            max_pull_multiplier: read_usize("MAX_PULL_MULTIPLIER", defaults.max_pull_multiplier),
            match_min_seconds: read_u64("MATCH_MIN_SECONDS", defaults.match_min_seconds),
            match_max_seconds: read_u64("MATCH_MAX_SECONDS", defaults.match_max_seconds),
            idle: Duration::from_millis(read_u64("MATCHMAKER_IDLE_MS", 250)),
            no_capacity: Duration::from_millis(read_u64("MATCHMAKER_NO_CAPACITY_MS", 500)),
            lock_ttl_ms: read_u64("MATCHMAKER_LOCK_TTL_MS", defaults.lock_ttl_ms),
            player_ttl_s: read_u64("PLAYER_TTL_S", defaults.player_ttl_s),
        }
    }

    pub fn max_pull(&self) -> usize {
        self.players_per_game.saturating_mul(self.max_pull_multiplier)
    }
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(fallback)
}
