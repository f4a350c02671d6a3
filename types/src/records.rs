//! Store-resident records and their hash codecs.
//!
//! Records are small hashes of snake_case string fields. Codecs are lenient
//! on read: a record missing its required fields decodes to `None` and the
//! caller treats it as malformed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    InLobby,
    Ready,
    InGame,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::InLobby => "IN_LOBBY",
            PlayerState::Ready => "READY",
            PlayerState::InGame => "IN_GAME",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "IN_LOBBY" => Some(PlayerState::InLobby),
            "READY" => Some(PlayerState::Ready),
            "IN_GAME" => Some(PlayerState::InGame),
            _ => None,
        }
    }
}

/// One player's record under `player:{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub state: PlayerState,
    /// Wall-clock ms of the last heartbeat.
    pub heartbeat_at: u64,
    pub game_id: Option<String>,
    pub session_id: Option<String>,
}

impl PlayerRecord {
    /// A fresh lobby record stamped with the given heartbeat.
    pub fn lobby(heartbeat_at: u64) -> Self {
        Self {
            state: PlayerState::InLobby,
            heartbeat_at,
            game_id: None,
            session_id: None,
        }
    }

    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("state", self.state.as_str().to_string()),
            ("heartbeat_at", self.heartbeat_at.to_string()),
            ("game_id", self.game_id.clone().unwrap_or_default()),
            ("session_id", self.session_id.clone().unwrap_or_default()),
        ]
    }

    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let state = PlayerState::parse(map.get("state")?)?;
        let heartbeat_at = map
            .get("heartbeat_at")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        Some(Self {
            state,
            heartbeat_at,
            game_id: non_empty(map.get("game_id")),
            session_id: non_empty(map.get("session_id")),
        })
    }
}

/// Lifecycle state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Running,
    Finished,
}

impl GameState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::Running => "RUNNING",
            GameState::Finished => "FINISHED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RUNNING" => Some(GameState::Running),
            "FINISHED" => Some(GameState::Finished),
            _ => None,
        }
    }
}

/// One game's record under `game:{id}`. The member set lives separately
/// under `game:{id}:players`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub session_id: String,
    pub state: GameState,
    pub started_at: u64,
    /// Absent on a malformed record; runners finalize such games on sight.
    pub end_at: Option<u64>,
    pub finished_at: Option<u64>,
}

impl GameRecord {
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("session_id", self.session_id.clone()),
            ("state", self.state.as_str().to_string()),
            ("started_at", self.started_at.to_string()),
        ];
        if let Some(end_at) = self.end_at {
            fields.push(("end_at", end_at.to_string()));
        }
        if let Some(finished_at) = self.finished_at {
            fields.push(("finished_at", finished_at.to_string()));
        }
        fields
    }

    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let session_id = non_empty(map.get("session_id"))?;
        let state = GameState::parse(map.get("state")?)?;
        Some(Self {
            session_id,
            state,
            started_at: parse_ms(map.get("started_at")).unwrap_or(0),
            end_at: parse_ms(map.get("end_at")),
            finished_at: parse_ms(map.get("finished_at")),
        })
    }
}

/// One session runner's placement record under `session:{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub max_slots: u32,
    pub active_games: u32,
    pub game_ids: Vec<String>,
    pub updated_at: u64,
}

impl SessionRecord {
    pub fn empty(max_slots: u32, updated_at: u64) -> Self {
        Self {
            max_slots,
            active_games: 0,
            game_ids: Vec::new(),
            updated_at,
        }
    }

    pub fn available_slots(&self) -> u32 {
        self.max_slots.saturating_sub(self.active_games)
    }

    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("max_slots", self.max_slots.to_string()),
            ("active_games", self.active_games.to_string()),
            ("game_ids", self.game_ids.join(",")),
            ("available_slots", self.available_slots().to_string()),
            ("updated_at", self.updated_at.to_string()),
        ]
    }

    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let max_slots = map.get("max_slots")?.parse().ok()?;
        let active_games = map
            .get("active_games")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        let game_ids = map
            .get("game_ids")
            .map(|raw| split_ids(raw))
            .unwrap_or_default();
        Some(Self {
            max_slots,
            active_games,
            game_ids,
            updated_at: parse_ms(map.get("updated_at")).unwrap_or(0),
        })
    }
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|raw| !raw.is_empty()).cloned()
}

fn parse_ms(value: Option<&String>) -> Option<u64> {
    value.and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_player_round_trip() {
        let record = PlayerRecord {
            state: PlayerState::InGame,
            heartbeat_at: 1234,
            game_id: Some("g1".into()),
            session_id: Some("session-1".into()),
        };
        let encoded: HashMap<String, String> = record
            .to_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(PlayerRecord::from_map(&encoded), Some(record));
    }

    #[test]
    fn test_player_empty_fields_decode_as_none() {
        let decoded = PlayerRecord::from_map(&map(&[
            ("state", "IN_LOBBY"),
            ("heartbeat_at", "9"),
            ("game_id", ""),
            ("session_id", ""),
        ]))
        .unwrap();
        assert_eq!(decoded.game_id, None);
        assert_eq!(decoded.session_id, None);
    }

    #[test]
    fn test_player_missing_state_is_malformed() {
        assert_eq!(PlayerRecord::from_map(&map(&[("heartbeat_at", "1")])), None);
        assert_eq!(
            PlayerRecord::from_map(&map(&[("state", "SLEEPING")])),
            None
        );
    }

    #[test]
    fn test_game_without_end_at_decodes() {
        let decoded = GameRecord::from_map(&map(&[
            ("session_id", "session-1"),
            ("state", "RUNNING"),
            ("started_at", "10"),
        ]))
        .unwrap();
        assert_eq!(decoded.end_at, None);
        assert_eq!(decoded.state, GameState::Running);
    }

    #[test]
    fn test_session_round_trip_and_slots() {
        let record = SessionRecord {
            max_slots: 5,
            active_games: 2,
            game_ids: vec!["g1".into(), "g2".into()],
            updated_at: 77,
        };
        assert_eq!(record.available_slots(), 3);
        let encoded: HashMap<String, String> = record
            .to_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(encoded.get("game_ids").unwrap(), "g1,g2");
        assert_eq!(encoded.get("available_slots").unwrap(), "3");
        assert_eq!(SessionRecord::from_map(&encoded), Some(record));
    }

    #[test]
    fn test_session_empty_game_ids() {
        let decoded = SessionRecord::from_map(&map(&[
            ("max_slots", "1"),
            ("active_games", "0"),
            ("game_ids", ""),
        ]))
        .unwrap();
        assert!(decoded.game_ids.is_empty());
    }
}
