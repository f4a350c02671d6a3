pub mod events;
pub mod keys;
pub mod protocol;
pub mod records;

pub use events::MatchEvent;
pub use protocol::{ClientFrame, FrameError, ServerFrame};
pub use records::{GameRecord, GameState, PlayerRecord, PlayerState, SessionRecord};

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Mint a fresh player identity.
pub fn mint_player_id() -> String {
    Uuid::new_v4().to_string()
}

/// Mint a fresh game identity.
pub fn mint_game_id() -> String {
    Uuid::new_v4().to_string()
}

/// Mint a fresh session identity for a runner without a stable one.
pub fn mint_session_id() -> String {
    format!("session-{}", Uuid::new_v4())
}
