//! Player record operations.

use crate::{Store, StoreError};
use matchpoint_types::{keys, PlayerRecord, PlayerState};
use redis::AsyncCommands;
use std::collections::HashMap;

impl Store {
    /// Read a player record. `None` covers both a missing key and a record
    /// too mangled to decode; callers treat them alike.
    pub async fn read_player(&self, id: &str) -> Result<Option<PlayerRecord>, StoreError> {
        let mut conn = self.conn();
        let map: HashMap<String, String> = conn.hgetall(keys::player(id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(PlayerRecord::from_map(&map))
    }

    /// Write a full player record, refreshing its TTL.
    pub async fn write_player(
        &self,
        id: &str,
        record: &PlayerRecord,
        ttl_s: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let key = keys::player(id);
        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(&key, &record.to_fields())
            .ignore()
            .expire(&key, ttl_s as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Set a player's state and refresh heartbeat + TTL in one group,
    /// leaving any game linkage fields as they are.
    pub async fn set_player_state(
        &self,
        id: &str,
        state: PlayerState,
        ttl_s: u64,
        now: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let key = keys::player(id);
        let _: () = redis::pipe()
            .atomic()
            .hset(&key, "state", state.as_str())
            .ignore()
            .hset(&key, "heartbeat_at", now)
            .ignore()
            .expire(&key, ttl_s as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// IN_LOBBY write that never downgrades a player already READY or
    /// IN_GAME. Creates the record when missing. Returns the state the
    /// record holds afterwards.
    pub async fn write_lobby_monotone(
        &self,
        id: &str,
        ttl_s: u64,
        now: u64,
    ) -> Result<PlayerState, StoreError> {
        match self.read_player(id).await? {
            Some(record) if record.state != PlayerState::InLobby => Ok(record.state),
            _ => {
                self.write_player(id, &PlayerRecord::lobby(now), ttl_s)
                    .await?;
                Ok(PlayerState::InLobby)
            }
        }
    }

    /// Refresh a player's heartbeat, re-creating the record in IN_LOBBY if
    /// it is missing (race with HELLO or TTL expiry).
    pub async fn touch_heartbeat(&self, id: &str, ttl_s: u64, now: u64) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let key = keys::player(id);
        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return self.write_player(id, &PlayerRecord::lobby(now), ttl_s).await;
        }
        let _: () = redis::pipe()
            .atomic()
            .hset(&key, "heartbeat_at", now)
            .ignore()
            .expire(&key, ttl_s as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Batch-read the `state` field for a set of players. Result order
    /// matches the input; missing or unparseable states come back `None`.
    pub async fn read_player_states(
        &self,
        ids: &[String],
    ) -> Result<Vec<Option<PlayerState>>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        for id in ids {
            pipe.hget(keys::player(id), "state");
        }
        let raw: Vec<Option<String>> = pipe.query_async(&mut conn).await?;
        Ok(raw
            .into_iter()
            .map(|state| state.as_deref().and_then(PlayerState::parse))
            .collect())
    }

    /// Batch-read `(state, heartbeat_at)` for a set of players, in input
    /// order. Missing records come back `(None, None)`.
    pub async fn read_player_liveness(
        &self,
        ids: &[String],
    ) -> Result<Vec<(Option<PlayerState>, Option<u64>)>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        for id in ids {
            pipe.cmd("HMGET")
                .arg(keys::player(id))
                .arg("state")
                .arg("heartbeat_at");
        }
        let raw: Vec<(Option<String>, Option<String>)> = pipe.query_async(&mut conn).await?;
        Ok(raw
            .into_iter()
            .map(|(state, heartbeat)| {
                (
                    state.as_deref().and_then(PlayerState::parse),
                    heartbeat.and_then(|raw| raw.parse().ok()),
                )
            })
            .collect())
    }

    /// Normalize a player back to the lobby: state reset, game linkage
    /// cleared. Heartbeat and TTL are deliberately left alone so an
    /// unreachable player still ages out.
    pub async fn reset_player_to_lobby(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let key = keys::player(id);
        let _: () = redis::pipe()
            .atomic()
            .hset(&key, "state", PlayerState::InLobby.as_str())
            .ignore()
            .hset(&key, "game_id", "")
            .ignore()
            .hset(&key, "session_id", "")
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Incremental scan of player keys, returning IDs. `cursor` starts at 0;
    /// a returned cursor of 0 means the scan is complete.
    pub async fn scan_players(
        &self,
        cursor: u64,
        batch: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let mut conn = self.conn();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(keys::PLAYER_SCAN_PATTERN)
            .arg("COUNT")
            .arg(batch)
            .query_async(&mut conn)
            .await?;
        let ids = keys
            .iter()
            .filter_map(|key| keys::player_id_from_key(key))
            .map(str::to_string)
            .collect();
        Ok((next, ids))
    }
}
