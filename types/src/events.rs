//! Event payloads fanned out over the store's pub/sub topics.

use serde::{Deserialize, Serialize};

/// Published on `events:match_found` and `events:match_ended`.
///
/// Carries everything a gateway needs to notify its locally connected
/// players; subscribers reading independently may observe the underlying
/// keys before the event arrives, never after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub game_id: String,
    pub session_id: String,
    pub player_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_round_trip() {
        let event = MatchEvent {
            game_id: "g1".into(),
            session_id: "session-1".into(),
            player_ids: vec!["a".into(), "b".into()],
        };
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: MatchEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
    }
}
