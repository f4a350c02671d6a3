//! Game records and the two pipelined write groups of a game's life:
//! materialization (matchmaker) and finalization (session runner).
//!
//! Neither group is fully transactional against concurrent clients; writes
//! within a group apply in submitted order, and a crash between the group
//! and its event publish is tolerated because runners drive finalization
//! from the game record, not from the event.

use crate::{Store, StoreError};
use matchpoint_types::{keys, GameRecord, GameState, PlayerRecord, PlayerState, SessionRecord};
use redis::AsyncCommands;
use std::collections::HashMap;

impl Store {
    pub async fn read_game(&self, id: &str) -> Result<Option<GameRecord>, StoreError> {
        let mut conn = self.conn();
        let map: HashMap<String, String> = conn.hgetall(keys::game(id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(GameRecord::from_map(&map))
    }

    /// Raw check that distinguishes a missing record from a malformed one.
    /// Returns `(exists, decoded)`.
    pub async fn read_game_raw(
        &self,
        id: &str,
    ) -> Result<(bool, Option<GameRecord>), StoreError> {
        let mut conn = self.conn();
        let map: HashMap<String, String> = conn.hgetall(keys::game(id)).await?;
        if map.is_empty() {
            return Ok((false, None));
        }
        Ok((true, GameRecord::from_map(&map)))
    }

    pub async fn read_game_players(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        Ok(conn.smembers(keys::game_players(id)).await?)
    }

    /// Materialize a freshly batched game: game hash, member set, and each
    /// player's transition to IN_GAME, in one ordered group. The session
    /// side of the accounting was already written at reservation time.
    /// Player heartbeats are left untouched.
    pub async fn materialize_game(
        &self,
        game_id: &str,
        record: &GameRecord,
        players: &[String],
        player_ttl_s: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(keys::game(game_id), &record.to_fields())
            .ignore();
        if !players.is_empty() {
            pipe.sadd(keys::game_players(game_id), players).ignore();
        }
        for id in players {
            let key = keys::player(id);
            pipe.hset(&key, "state", PlayerState::InGame.as_str())
                .ignore()
                .hset(&key, "game_id", game_id)
                .ignore()
                .hset(&key, "session_id", &record.session_id)
                .ignore()
                .expire(&key, player_ttl_s as i64)
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Finalize a game: FINISHED marker, every player restored to the
    /// lobby with linkage cleared and heartbeat refreshed, and the session
    /// record plus availability index updated, in one ordered group.
    pub async fn finalize_game(
        &self,
        game_id: &str,
        players: &[String],
        session_id: &str,
        session: &SessionRecord,
        player_ttl_s: u64,
        now: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(keys::game(game_id), "state", GameState::Finished.as_str())
            .ignore()
            .hset(keys::game(game_id), "finished_at", now)
            .ignore();
        for id in players {
            let key = keys::player(id);
            pipe.hset_multiple(&key, &PlayerRecord::lobby(now).to_fields())
                .ignore()
                .expire(&key, player_ttl_s as i64)
                .ignore();
        }
        let session_key = keys::session(session_id);
        let available = session.available_slots();
        pipe.hset_multiple(&session_key, &session.to_fields())
            .ignore();
        if available > 0 {
            pipe.zadd(keys::SESSIONS_AVAILABLE, session_id, available)
                .ignore();
        } else {
            pipe.zrem(keys::SESSIONS_AVAILABLE, session_id).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
