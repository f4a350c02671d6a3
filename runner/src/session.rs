//! One runner, one `session:{id}` record, up to `max_slots` games.
//!
//! The matchmaker hands games over by appending to the session record's
//! `game_ids`; the runner discovers them on its next poll. Finalization is
//! gated twice: the per-game TTL lock handles concurrent runners, the
//! game-state check under the lock handles restarts after a lost lock.

use crate::Config;
use matchpoint_store::{Store, StoreError};
use matchpoint_types::{keys, now_ms, GameState, MatchEvent, SessionRecord};
use tracing::{debug, info, warn};

pub struct SessionRunner {
    store: Store,
    cfg: Config,
    session_id: String,
    /// Games this process currently owns, in adoption order.
    tracked: Vec<String>,
}

impl SessionRunner {
    /// Read any pre-existing session record, re-adopt its RUNNING games
    /// (crash recovery), and publish availability.
    pub async fn start(store: Store, cfg: Config, session_id: String) -> Result<Self, StoreError> {
        let mut runner = Self {
            store,
            cfg,
            session_id,
            tracked: Vec::new(),
        };
        let mut dead = Vec::new();
        if let Some(record) = runner.store.read_session(&runner.session_id).await? {
            for game_id in record.game_ids {
                match runner.store.read_game(&game_id).await? {
                    Some(game) if game.state == GameState::Running => {
                        runner.tracked.push(game_id);
                    }
                    _ => dead.push(game_id),
                }
            }
        }
        runner.republish_availability(&dead).await?;
        info!(
            session = %runner.session_id,
            adopted = runner.tracked.len(),
            max_slots = runner.cfg.max_slots,
            "session runner online"
        );
        Ok(runner)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn tracked(&self) -> &[String] {
        &self.tracked
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.cfg.poll);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(err) = self.tick().await {
                warn!(session = %self.session_id, "tick failed: {err}");
            }
        }
    }

    /// One poll: discover handed-off games, then check liveness of every
    /// tracked game.
    pub async fn tick(&mut self) -> Result<(), StoreError> {
        if let Some(record) = self.store.read_session(&self.session_id).await? {
            for game_id in record.game_ids {
                if !self.tracked.contains(&game_id) {
                    info!(session = %self.session_id, game = %game_id, "adopted game");
                    self.tracked.push(game_id);
                }
            }
        }

        let now = now_ms();
        for game_id in self.tracked.clone() {
            let (exists, game) = self.store.read_game_raw(&game_id).await?;
            let Some(game) = game else {
                let reason = if exists { "malformed" } else { "missing" };
                self.drop_game(&game_id, reason).await?;
                continue;
            };
            if game.state == GameState::Finished {
                self.drop_game(&game_id, "already finished").await?;
                continue;
            }
            // A record without an end time can never terminate on its own;
            // finalize it on sight.
            let due = game.end_at.map_or(true, |end_at| now >= end_at);
            if due {
                self.try_finalize(&game_id).await?;
            }
        }
        Ok(())
    }

    /// Attempt the exactly-once finish. Returns whether this runner was
    /// the one that finalized.
    pub async fn try_finalize(&mut self, game_id: &str) -> Result<bool, StoreError> {
        let lock_key = keys::finish_lock(game_id);
        let held = self
            .store
            .try_lock(&lock_key, &self.session_id, self.cfg.finish_lock_ttl_ms)
            .await?;
        if !held {
            debug!(game = %game_id, "finish lock contended, yielding");
            return Ok(false);
        }
        // Re-check under the lock: a previous holder may have finished the
        // game before its lock expired.
        let Some(game) = self.store.read_game(game_id).await? else {
            self.drop_game(game_id, "missing").await?;
            return Ok(false);
        };
        if game.state == GameState::Finished {
            self.drop_game(game_id, "already finished").await?;
            return Ok(false);
        }

        let players = self.store.read_game_players(game_id).await?;
        let now = now_ms();
        let mut record = self
            .store
            .read_session(&self.session_id)
            .await?
            .unwrap_or_else(|| SessionRecord::empty(self.cfg.max_slots, now));
        record.max_slots = self.cfg.max_slots;
        record.game_ids.retain(|id| id != game_id);
        record.active_games = record.game_ids.len() as u32;
        record.updated_at = now;

        self.store
            .finalize_game(
                game_id,
                &players,
                &self.session_id,
                &record,
                self.cfg.player_ttl_s,
                now,
            )
            .await?;
        self.tracked.retain(|id| id != game_id);

        let event = MatchEvent {
            game_id: game_id.to_string(),
            session_id: self.session_id.clone(),
            player_ids: players,
        };
        if let Err(err) = self.store.publish_event(keys::MATCH_ENDED, &event).await {
            warn!(game = %game_id, "match_ended publish failed: {err}");
        }
        info!(
            session = %self.session_id,
            game = %game_id,
            players = event.player_ids.len(),
            "game finalized"
        );
        Ok(true)
    }

    /// Stop tracking a dead game and republish availability without it.
    async fn drop_game(&mut self, game_id: &str, reason: &str) -> Result<(), StoreError> {
        info!(session = %self.session_id, game = %game_id, reason, "dropping game");
        self.tracked.retain(|id| id != game_id);
        self.republish_availability(&[game_id.to_string()]).await
    }

    /// Sync the session record and the availability index. Starts from the
    /// store's `game_ids` (which may hold reservations this runner has not
    /// discovered yet), prunes known-dead games, and unions the local view.
    async fn republish_availability(&self, prune: &[String]) -> Result<(), StoreError> {
        let mut game_ids = self
            .store
            .read_session(&self.session_id)
            .await?
            .map(|record| record.game_ids)
            .unwrap_or_default();
        game_ids.retain(|id| !prune.contains(id));
        for id in &self.tracked {
            if !game_ids.contains(id) {
                game_ids.push(id.clone());
            }
        }
        let record = SessionRecord {
            max_slots: self.cfg.max_slots,
            active_games: game_ids.len() as u32,
            game_ids,
            updated_at: now_ms(),
        };
        self.store.write_session(&self.session_id, &record).await
    }
}
