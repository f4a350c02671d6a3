use std::time::Duration;

/// Capacity-provider tuning, environment-level.
#[derive(Debug, Clone)]
pub struct Config {
    pub min_sessions: u32,
    pub max_sessions: u32,
    /// Utilization above which the pool grows.
    pub scale_up_threshold: f64,
    /// Utilization below which the sustained-low timer runs.
    pub scale_down_threshold: f64,
    pub scale_up_cooldown: Duration,
    /// How long utilization must stay low before any teardown.
    pub scale_down_cooldown: Duration,
    pub scale_up_batch: u32,
    pub scale_down_batch: u32,
    pub poll: Duration,
    /// Batch size N, for translating demand into sessions.
    pub players_per_game: u32,
    pub slots_per_session: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_sessions: 1,
            max_sessions: 10,
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.3,
            scale_up_cooldown: Duration::from_millis(30_000),
            scale_down_cooldown: Duration::from_millis(300_000),
            scale_up_batch: 5,
            scale_down_batch: 3,
            poll: Duration::from_millis(5_000),
            players_per_game: 100,
            slots_per_session: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_sessions: read_u32("MIN_SESSIONS", defaults.min_sessions),
            max_sessions: read_u32("MAX_SESSIONS", defaults.max_sessions),
            scale_up_threshold: read_f64("SCALE_UP_THRESHOLD", defaults.scale_up_threshold),
            scale_down_threshold: read_f64("SCALE_DOWN_THRESHOLD", defaults.scale_down_threshold),
            scale_up_cooldown: Duration::from_millis(read_u64("SCALE_UP_COOLDOWN_MS", 30_000)),
            scale_down_cooldown: Duration::from_millis(read_u64(
                "SCALE_DOWN_COOLDOWN_MS",
                300_000,
            )),
            scale_up_batch: read_u32("SCALE_UP_BATCH", defaults.scale_up_batch),
            scale_down_batch: read_u32("SCALE_DOWN_BATCH", defaults.scale_down_batch),
            poll: Duration::from_millis(read_u64("CAPACITY_POLL_MS", 5_000)),
            players_per_game: read_u32("PLAYERS_PER_GAME", defaults.players_per_game),
            slots_per_session: read_u32("SESSION_MAX_SLOTS", defaults.slots_per_session),
        }
    }
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_u32(key: &str, fallback: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(fallback)
}

fn read_f64(key: &str, fallback: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or(fallback)
}
