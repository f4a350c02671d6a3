//! Key layout for the coordination store.
//!
//! Every role communicates exclusively through these key families; the
//! functions here are the single source of truth for their shapes.

/// FIFO list of player IDs believed to be READY. Entries are hints and may
/// be stale; consumers validate state before use.
pub const READY_QUEUE: &str = "queue:ready";

/// Sorted set of sessions with free slots, scored by `available_slots`.
pub const SESSIONS_AVAILABLE: &str = "sessions:available";

/// Fleet-wide advisory lock around the matchmaker critical section.
pub const MATCHMAKER_LOCK: &str = "lock:matchmaker";

/// Topic carrying [`crate::MatchEvent`] payloads when a game is formed.
pub const MATCH_FOUND: &str = "events:match_found";

/// Topic carrying [`crate::MatchEvent`] payloads when a game finishes.
pub const MATCH_ENDED: &str = "events:match_ended";

/// Scan pattern matching every player record.
pub const PLAYER_SCAN_PATTERN: &str = "player:*";

/// Scan pattern matching every session record.
pub const SESSION_SCAN_PATTERN: &str = "session:*";

pub fn player(id: &str) -> String {
    format!("player:{id}")
}

pub fn game(id: &str) -> String {
    format!("game:{id}")
}

/// Set of the player IDs placed into a game.
pub fn game_players(id: &str) -> String {
    format!("game:{id}:players")
}

pub fn session(id: &str) -> String {
    format!("session:{id}")
}

/// Per-game finalization lock; the acquirer alone finalizes.
pub fn finish_lock(game_id: &str) -> String {
    format!("lock:finish:{game_id}")
}

/// Extract the player ID from a `player:{id}` key, if it is one.
pub fn player_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix("player:")
}

/// Extract the session ID from a `session:{id}` key, if it is one.
pub fn session_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix("session:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(player("p1"), "player:p1");
        assert_eq!(game("g1"), "game:g1");
        assert_eq!(game_players("g1"), "game:g1:players");
        assert_eq!(session("session-3"), "session:session-3");
        assert_eq!(finish_lock("g1"), "lock:finish:g1");
    }

    #[test]
    fn test_key_extraction() {
        assert_eq!(player_id_from_key("player:abc"), Some("abc"));
        assert_eq!(player_id_from_key("game:abc"), None);
        assert_eq!(session_id_from_key("session:session-1"), Some("session-1"));
    }
}
