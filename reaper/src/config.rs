use std::time::Duration;

/// Reaper tuning, environment-level.
#[derive(Debug, Clone)]
pub struct Config {
    pub period: Duration,
    /// Heartbeat age beyond which a player is considered unreachable.
    pub stale_ms: u64,
    /// Leave `game_id`/`session_id` alone for stale players whose state is
    /// IN_GAME (their session runner rewrites the record on finish).
    pub skip_in_game: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(5_000),
            stale_ms: 30_000,
            skip_in_game: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            period: Duration::from_millis(read_u64("REAPER_PERIOD_MS", 5_000)),
            stale_ms: read_u64("STALE_MS", defaults.stale_ms),
            skip_in_game: read_bool("REAPER_SKIP_IN_GAME", defaults.skip_in_game),
        }
    }
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_bool(key: &str, fallback: bool) -> bool {
    match std::env::var(key).as_deref() {
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes") | Ok("YES") => true,
        Ok("0") | Ok("false") | Ok("FALSE") | Ok("no") | Ok("NO") => false,
        _ => fallback,
    }
}
