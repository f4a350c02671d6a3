//! Background sweeper for stale queue entries and unreachable players.
//!
//! Both passes are idempotent over the store and safe to run alongside
//! every other role; queue removal is value-based so concurrent pops never
//! shift what gets deleted.

pub mod config;

pub use config::Config;

use matchpoint_store::{Store, StoreError};
use matchpoint_types::{now_ms, PlayerRecord, PlayerState};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const SCAN_BATCH: usize = 100;

/// What one sweep did, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub queue_removed: usize,
    pub players_reset: usize,
}

/// Whether a queue entry should be deleted: anything not verifiably READY
/// and fresh is stale.
pub fn queue_entry_is_stale(
    state: Option<PlayerState>,
    heartbeat_at: Option<u64>,
    now: u64,
    stale_ms: u64,
) -> bool {
    if state != Some(PlayerState::Ready) {
        return true;
    }
    match heartbeat_at {
        Some(heartbeat) => now.saturating_sub(heartbeat) > stale_ms,
        None => true,
    }
}

/// Whether a scanned player record needs normalizing. Players in active
/// games may carry stale heartbeats while their runner owns them; the
/// `skip_in_game` toggle leaves those records untouched.
pub fn player_is_stale(record: &PlayerRecord, now: u64, stale_ms: u64) -> bool {
    now.saturating_sub(record.heartbeat_at) > stale_ms
}

pub struct Reaper {
    store: Store,
    cfg: Config,
}

impl Reaper {
    pub fn new(store: Store, cfg: Config) -> Self {
        Self { store, cfg }
    }

    pub async fn run(self) {
        info!(
            period_ms = self.cfg.period.as_millis() as u64,
            stale_ms = self.cfg.stale_ms,
            skip_in_game = self.cfg.skip_in_game,
            "reaper running"
        );
        let mut interval = tokio::time::interval(self.cfg.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match self.sweep().await {
                Ok(stats) if stats != SweepStats::default() => {
                    info!(
                        queue_removed = stats.queue_removed,
                        players_reset = stats.players_reset,
                        "sweep complete"
                    );
                }
                Ok(_) => debug!("sweep complete, nothing stale"),
                Err(err) => warn!("sweep failed: {err}"),
            }
        }
    }

    pub async fn sweep(&self) -> Result<SweepStats, StoreError> {
        let mut stats = SweepStats::default();
        stats.queue_removed = self.sweep_queue().await?;
        stats.players_reset = self.sweep_players().await?;
        Ok(stats)
    }

    /// Queue hygiene: delete entries whose player is no longer READY or has
    /// gone quiet.
    async fn sweep_queue(&self) -> Result<usize, StoreError> {
        let snapshot = self.store.queue_snapshot().await?;
        if snapshot.is_empty() {
            return Ok(0);
        }
        let unique: Vec<String> = {
            let mut seen = HashSet::new();
            snapshot
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect()
        };
        let liveness = self.store.read_player_liveness(&unique).await?;
        let now = now_ms();
        let mut removed = 0;
        for (id, (state, heartbeat_at)) in unique.iter().zip(liveness) {
            if queue_entry_is_stale(state, heartbeat_at, now, self.cfg.stale_ms) {
                self.store.queue_remove(id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Player hygiene: walk `player:*` incrementally and normalize anyone
    /// whose heartbeat has lapsed.
    async fn sweep_players(&self) -> Result<usize, StoreError> {
        let now = now_ms();
        let mut reset = 0;
        let mut cursor = 0u64;
        loop {
            let (next, ids) = self.store.scan_players(cursor, SCAN_BATCH).await?;
            for id in &ids {
                let Some(record) = self.store.read_player(id).await? else {
                    continue;
                };
                if !player_is_stale(&record, now, self.cfg.stale_ms) {
                    continue;
                }
                self.store.queue_remove(id).await?;
                if self.cfg.skip_in_game && record.state == PlayerState::InGame {
                    continue;
                }
                self.store.reset_player_to_lobby(id).await?;
                reset += 1;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_and_fresh_survives() {
        assert!(!queue_entry_is_stale(
            Some(PlayerState::Ready),
            Some(100_000),
            110_000,
            30_000
        ));
    }

    #[test]
    fn test_non_ready_states_are_stale() {
        for state in [Some(PlayerState::InLobby), Some(PlayerState::InGame), None] {
            assert!(queue_entry_is_stale(state, Some(100_000), 100_001, 30_000));
        }
    }

    #[test]
    fn test_lapsed_heartbeat_is_stale() {
        assert!(queue_entry_is_stale(
            Some(PlayerState::Ready),
            Some(0),
            30_001,
            30_000
        ));
        assert!(queue_entry_is_stale(
            Some(PlayerState::Ready),
            None,
            1,
            30_000
        ));
    }

    #[test]
    fn test_player_staleness_boundary() {
        let record = PlayerRecord {
            state: PlayerState::Ready,
            heartbeat_at: 70_000,
            game_id: None,
            session_id: None,
        };
        assert!(!player_is_stale(&record, 100_000, 30_000));
        assert!(player_is_stale(&record, 100_001, 30_000));
    }
}
