//! The matchmaking loop.
//!
//! Safe to run many instances: a fleet-wide advisory lock keeps them from
//! duplicating work, and correctness rests on the atomic slot reservation
//! rather than the lock.

use crate::batch::collect_batch;
use crate::{sample_duration_ms, Config};
use matchpoint_store::{Store, StoreError};
use matchpoint_types::{keys, mint_game_id, now_ms, GameRecord, GameState, MatchEvent};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// What one pass under the lock accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Queue below N; nothing to do.
    Idle,
    /// Ready players waiting but no free slot anywhere.
    NoCapacity,
    /// Formed this many games (possibly zero after a starved attempt).
    Formed(usize),
}

enum FormOutcome {
    Formed,
    /// ZPOPMAX found nothing; capacity vanished since the target estimate.
    NoSlot,
    /// Fewer than N live READY players; slot released, queue restored.
    Starved,
}

pub struct Matchmaker {
    store: Store,
    cfg: Config,
    instance_id: String,
    rng: StdRng,
}

impl Matchmaker {
    pub fn new(store: Store, cfg: Config, instance_id: String) -> Self {
        Self {
            store,
            cfg,
            instance_id,
            rng: StdRng::from_entropy(),
        }
    }

    pub async fn run(mut self) {
        info!(instance = %self.instance_id, n = self.cfg.players_per_game, "matchmaker running");
        loop {
            let held = match self
                .store
                .try_lock(keys::MATCHMAKER_LOCK, &self.instance_id, self.cfg.lock_ttl_ms)
                .await
            {
                Ok(held) => held,
                Err(err) => {
                    warn!("lock acquire failed: {err}");
                    sleep(self.cfg.idle).await;
                    continue;
                }
            };
            if !held {
                sleep(self.cfg.idle).await;
                continue;
            }

            let outcome = self.tick().await;
            if let Err(err) = self
                .store
                .unlock(keys::MATCHMAKER_LOCK, &self.instance_id)
                .await
            {
                warn!("lock release failed: {err}");
            }

            match outcome {
                Ok(TickOutcome::Idle) => sleep(self.cfg.idle).await,
                Ok(TickOutcome::NoCapacity) => sleep(self.cfg.no_capacity).await,
                // A starved attempt formed nothing; yield instead of
                // spinning on the same stale entries.
                Ok(TickOutcome::Formed(0)) => sleep(self.cfg.idle).await,
                Ok(TickOutcome::Formed(count)) => {
                    debug!(count, "tick complete");
                }
                Err(err) => {
                    warn!("tick failed: {err}");
                    sleep(self.cfg.idle).await;
                }
            }
        }
    }

    /// One pass under the advisory lock.
    pub async fn tick(&mut self) -> Result<TickOutcome, StoreError> {
        let n = self.cfg.players_per_game.max(1) as u64;
        let queue_len = self.store.queue_len().await?;
        if queue_len < n {
            return Ok(TickOutcome::Idle);
        }
        let free_slots = self.store.available_total().await?;
        let target = (queue_len / n).min(free_slots);
        if target == 0 {
            return Ok(TickOutcome::NoCapacity);
        }

        let mut formed = 0usize;
        for _ in 0..target {
            match self.form_game().await? {
                FormOutcome::Formed => formed += 1,
                FormOutcome::NoSlot | FormOutcome::Starved => break,
            }
        }
        Ok(TickOutcome::Formed(formed))
    }

    /// Reserve a slot, collect a batch, materialize, announce. Any failure
    /// after the reservation releases the slot before surfacing.
    async fn form_game(&mut self) -> Result<FormOutcome, StoreError> {
        let game_id = mint_game_id();
        let Some(reservation) = self.store.reserve_slot(&game_id).await? else {
            return Ok(FormOutcome::NoSlot);
        };

        let n = self.cfg.players_per_game;
        let players = match collect_batch(&self.store, n, self.cfg.max_pull()).await {
            Ok(Some(players)) => players,
            Ok(None) => {
                self.store.release_slot(&reservation, &game_id).await?;
                debug!(session = %reservation.session_id, "batch starved, slot released");
                return Ok(FormOutcome::Starved);
            }
            Err(err) => {
                if let Err(release_err) = self.store.release_slot(&reservation, &game_id).await {
                    error!(
                        session = %reservation.session_id,
                        "slot release failed after batch error: {release_err}"
                    );
                }
                return Err(err);
            }
        };

        let now = now_ms();
        let duration_ms = sample_duration_ms(
            &mut self.rng,
            self.cfg.match_min_seconds,
            self.cfg.match_max_seconds,
        );
        let record = GameRecord {
            session_id: reservation.session_id.clone(),
            state: GameState::Running,
            started_at: now,
            end_at: Some(now + duration_ms),
            finished_at: None,
        };
        if let Err(err) = self
            .store
            .materialize_game(&game_id, &record, &players, self.cfg.player_ttl_s)
            .await
        {
            if let Err(release_err) = self.store.release_slot(&reservation, &game_id).await {
                error!(
                    session = %reservation.session_id,
                    "slot release failed after materialize error: {release_err}"
                );
            }
            return Err(err);
        }

        let event = MatchEvent {
            game_id: game_id.clone(),
            session_id: reservation.session_id.clone(),
            player_ids: players.clone(),
        };
        // The game record is authoritative; a lost announcement only delays
        // client notification, so it is not worth failing the tick over.
        if let Err(err) = self.store.publish_event(keys::MATCH_FOUND, &event).await {
            warn!(%game_id, "match_found publish failed: {err}");
        }
        info!(
            %game_id,
            session = %reservation.session_id,
            players = players.len(),
            duration_ms,
            "match formed"
        );
        Ok(FormOutcome::Formed)
    }
}
