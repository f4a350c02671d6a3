//! The provider loop: reconcile, sample, plan, apply.

use crate::backend::{CapacityBackend, RunnerInstance, RunnerStatus};
use crate::policy::{next_runner_ids, plan, DemandMetrics, ScaleState};
use crate::Config;
use anyhow::Result;
use matchpoint_store::Store;
use matchpoint_types::{now_ms, GameState, SessionRecord};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Two identifiers that name the same runner, tolerating the legacy
/// bare-number key shape next to the canonical `session-<n>` one.
pub fn same_runner(a: &str, b: &str) -> bool {
    a == b
        || a.strip_prefix("session-").is_some_and(|bare| bare == b)
        || b.strip_prefix("session-").is_some_and(|bare| bare == a)
}

/// Which store sessions to delete given the backend's live runner set:
/// sessions for runners the backend no longer has, plus non-canonical
/// duplicates of runners that also have a canonical record.
pub fn reconcile_deletions(store_ids: &[String], live_ids: &[String]) -> Vec<String> {
    let live: HashSet<&str> = live_ids.iter().map(String::as_str).collect();
    let store: HashSet<&str> = store_ids.iter().map(String::as_str).collect();
    store_ids
        .iter()
        .filter(|id| {
            if live.contains(id.as_str()) {
                return false;
            }
            match live_ids.iter().find(|lid| same_runner(id, lid)) {
                // Alias of a live runner: drop it only when the canonical
                // record also exists, otherwise it is the record.
                Some(lid) => store.contains(lid.as_str()),
                None => true,
            }
        })
        .cloned()
        .collect()
}

pub struct CapacityProvider<B> {
    store: Store,
    backend: B,
    cfg: Config,
    state: ScaleState,
}

impl<B: CapacityBackend> CapacityProvider<B> {
    pub fn new(store: Store, backend: B, cfg: Config) -> Self {
        Self {
            store,
            backend,
            cfg,
            state: ScaleState::default(),
        }
    }

    pub async fn run(mut self) {
        info!(
            min = self.cfg.min_sessions,
            max = self.cfg.max_sessions,
            poll_ms = self.cfg.poll.as_millis() as u64,
            "capacity provider running"
        );
        let mut interval = tokio::time::interval(self.cfg.poll);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(err) = self.tick().await {
                warn!("capacity tick failed: {err:#}");
            }
        }
    }

    pub async fn tick(&mut self) -> Result<()> {
        let instances = self.backend.list().await?;
        let sessions = self.reconcile(&instances).await?;
        let metrics = sample(&sessions, &instances, self.store.queue_len().await?);
        let decision = plan(
            &metrics,
            &sessions,
            &mut self.state,
            &self.cfg,
            Instant::now(),
        );
        if decision.is_empty() {
            debug!(
                queue = metrics.queue_len,
                sessions = metrics.total_sessions,
                used = metrics.used_slots,
                total = metrics.total_slots,
                "steady"
            );
            return Ok(());
        }
        // A backend that knows of runners the store also knows about is
        // healthy enough to act on; one that reports nothing while sessions
        // exist is mid-outage, and scaling against it would misfire.
        if instances.is_empty() && !sessions.is_empty() {
            warn!(
                create = decision.create,
                destroy = decision.destroy.len(),
                "backend reports no runners; holding scaling actions"
            );
            return Ok(());
        }
        self.apply(&decision, &instances, &sessions).await;
        Ok(())
    }

    /// Bring the store in line with the backend: drop sessions for dead
    /// runners (unless the backend reports nothing, which reads as an
    /// outage), then rebuild counters and the availability index from the
    /// games that actually exist. Returns the surviving sessions.
    async fn reconcile(
        &self,
        instances: &[RunnerInstance],
    ) -> Result<Vec<(String, SessionRecord)>> {
        let mut sessions = self.store.list_sessions().await?;

        if instances.is_empty() {
            if !sessions.is_empty() {
                warn!(
                    sessions = sessions.len(),
                    "backend reports no runners; skipping store deletions"
                );
            }
        } else {
            let live: Vec<String> = instances
                .iter()
                .filter(|instance| instance.status != RunnerStatus::Terminating)
                .map(|instance| instance.id.clone())
                .collect();
            let store_ids: Vec<String> = sessions.iter().map(|(id, _)| id.clone()).collect();
            for id in reconcile_deletions(&store_ids, &live) {
                info!(session = %id, "deleting session with no backing runner");
                self.store.delete_session(&id).await?;
                sessions.retain(|(sid, _)| sid != &id);
            }
        }

        for (id, record) in &mut sessions {
            let mut live_games = Vec::with_capacity(record.game_ids.len());
            for game_id in &record.game_ids {
                match self.store.read_game(game_id).await? {
                    Some(game) if game.state == GameState::Running => {
                        live_games.push(game_id.clone());
                    }
                    _ => {}
                }
            }
            let repaired = SessionRecord {
                max_slots: record.max_slots,
                active_games: live_games.len() as u32,
                game_ids: live_games,
                updated_at: record.updated_at,
            };
            if repaired != *record {
                info!(
                    session = %id,
                    before = record.active_games,
                    after = repaired.active_games,
                    "repairing session accounting"
                );
                let stamped = SessionRecord {
                    updated_at: now_ms(),
                    ..repaired
                };
                self.store.write_session(id, &stamped).await?;
                *record = stamped;
            } else {
                // Counters are right; still resync the index entry in case
                // it drifted.
                self.store.write_session(id, record).await?;
            }
        }
        Ok(sessions)
    }

    /// Fire the plan at the backend. Individual failures are logged and
    /// retried naturally on the next tick.
    async fn apply(
        &self,
        decision: &crate::policy::ScalePlan,
        instances: &[RunnerInstance],
        sessions: &[(String, SessionRecord)],
    ) {
        if decision.create > 0 {
            let mut in_use: Vec<String> =
                instances.iter().map(|instance| instance.id.clone()).collect();
            in_use.extend(sessions.iter().map(|(id, _)| id.clone()));
            for id in next_runner_ids(&in_use, decision.create) {
                info!(runner = %id, "provisioning session runner");
                if let Err(err) = self.backend.create(&id).await {
                    warn!(runner = %id, "provision failed: {err:#}");
                }
            }
        }
        for id in &decision.destroy {
            info!(runner = %id, "decommissioning session runner");
            if let Err(err) = self.backend.destroy(id).await {
                warn!(runner = %id, "teardown failed: {err:#}");
                continue;
            }
            if let Err(err) = self.store.delete_session(id).await {
                warn!(runner = %id, "session delete failed: {err}");
            }
        }
    }
}

/// Fold the store's sessions and the backend's in-flight runners into one
/// demand snapshot.
fn sample(
    sessions: &[(String, SessionRecord)],
    instances: &[RunnerInstance],
    queue_len: u64,
) -> DemandMetrics {
    let total_slots: u32 = sessions.iter().map(|(_, r)| r.max_slots).sum();
    let used_slots: u32 = sessions.iter().map(|(_, r)| r.active_games).sum();
    let registered: HashSet<&str> = sessions.iter().map(|(id, _)| id.as_str()).collect();
    let pending = instances
        .iter()
        .filter(|instance| {
            instance.status != RunnerStatus::Terminating
                && !registered
                    .iter()
                    .any(|sid| same_runner(sid, &instance.id))
        })
        .count() as u32;
    DemandMetrics {
        queue_len,
        total_sessions: sessions.len() as u32 + pending,
        total_slots,
        used_slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_same_runner_tolerates_key_shapes() {
        assert!(same_runner("session-3", "session-3"));
        assert!(same_runner("session-3", "3"));
        assert!(same_runner("3", "session-3"));
        assert!(!same_runner("session-3", "session-4"));
    }

    #[test]
    fn test_dead_runner_sessions_are_deleted() {
        let deletions = reconcile_deletions(
            &ids(&["session-1", "session-2"]),
            &ids(&["session-1"]),
        );
        assert_eq!(deletions, ids(&["session-2"]));
    }

    #[test]
    fn test_alias_deleted_only_next_to_canonical() {
        // Both shapes present: the bare alias goes.
        let deletions = reconcile_deletions(
            &ids(&["session-1", "1"]),
            &ids(&["session-1"]),
        );
        assert_eq!(deletions, ids(&["1"]));

        // Only the alias exists: it is the record, keep it.
        let deletions = reconcile_deletions(&ids(&["1"]), &ids(&["session-1"]));
        assert!(deletions.is_empty());
    }

    #[test]
    fn test_sampling_counts_pending_runners() {
        let sessions = vec![("session-1".to_string(), SessionRecord::empty(5, 0))];
        let instances = vec![
            RunnerInstance {
                id: "session-1".to_string(),
                status: RunnerStatus::Online,
            },
            RunnerInstance {
                id: "session-2".to_string(),
                status: RunnerStatus::Provisioning,
            },
            RunnerInstance {
                id: "session-3".to_string(),
                status: RunnerStatus::Terminating,
            },
        ];
        let metrics = sample(&sessions, &instances, 7);
        assert_eq!(metrics.total_sessions, 2);
        assert_eq!(metrics.total_slots, 5);
        assert_eq!(metrics.queue_len, 7);
    }
}
