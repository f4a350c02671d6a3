//! The scaling decision, kept pure so every branch is testable without a
//! store or a backend.

use crate::Config;
use matchpoint_types::SessionRecord;
use std::time::Instant;

/// Demand signals sampled from the store each tick. `total_sessions`
/// includes runners the backend is still provisioning, so repeated ticks
/// do not over-create while capacity is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemandMetrics {
    pub queue_len: u64,
    pub total_sessions: u32,
    pub total_slots: u32,
    pub used_slots: u32,
}

impl DemandMetrics {
    pub fn available_slots(&self) -> u32 {
        self.total_slots.saturating_sub(self.used_slots)
    }

    pub fn utilization(&self) -> f64 {
        if self.total_slots == 0 {
            return 0.0;
        }
        f64::from(self.used_slots) / f64::from(self.total_slots)
    }

    /// Players currently held by running games, derived from slot usage.
    pub fn players_in_game(&self, players_per_game: u32) -> u64 {
        u64::from(self.used_slots) * u64::from(players_per_game)
    }
}

/// Timers the policy carries between ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleState {
    pub last_scale_up: Option<Instant>,
    /// When utilization first dropped below the scale-down threshold;
    /// cleared by any tick that is not low.
    pub low_since: Option<Instant>,
}

/// What one tick decided. `destroy` is ordered highest ID first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalePlan {
    pub create: u32,
    pub destroy: Vec<String>,
}

impl ScalePlan {
    pub fn is_empty(&self) -> bool {
        self.create == 0 && self.destroy.is_empty()
    }
}

/// Sessions required to serve everyone currently playing or queued,
/// clamped to the configured pool bounds.
fn sessions_needed(metrics: &DemandMetrics, cfg: &Config) -> u32 {
    let n = u64::from(cfg.players_per_game.max(1));
    let slots = u64::from(cfg.slots_per_session.max(1));
    let demand_players = metrics.players_in_game(cfg.players_per_game) + metrics.queue_len;
    let games = demand_players.div_ceil(n);
    let sessions = games.div_ceil(slots);
    sessions.clamp(u64::from(cfg.min_sessions), u64::from(cfg.max_sessions)) as u32
}

/// Evaluate the scaling policy for one tick.
///
/// Order matters: bootstrap, then the starvation override (which bypasses
/// the scale-up cooldown), then cooldown-gated scale-up, then the
/// sustained-low scale-down.
pub fn plan(
    metrics: &DemandMetrics,
    sessions: &[(String, SessionRecord)],
    state: &mut ScaleState,
    cfg: &Config,
    now: Instant,
) -> ScalePlan {
    let mut plan = ScalePlan::default();
    let total = metrics.total_sessions;

    if total < cfg.min_sessions {
        plan.create = (cfg.min_sessions - total).min(cfg.scale_up_batch);
        state.low_since = None;
        return plan;
    }

    let headroom = cfg.max_sessions.saturating_sub(total);
    let starving = metrics.queue_len >= u64::from(cfg.players_per_game)
        && metrics.available_slots() == 0;
    if starving && headroom > 0 {
        // Bypasses the cooldown; creating zero here means the needed
        // capacity is already in flight, so fall through.
        let create = sessions_needed(metrics, cfg)
            .saturating_sub(total)
            .min(cfg.scale_up_batch)
            .min(headroom);
        if create > 0 {
            plan.create = create;
            state.last_scale_up = Some(now);
            state.low_since = None;
            return plan;
        }
    }

    let utilization = metrics.utilization();
    if utilization > cfg.scale_up_threshold {
        state.low_since = None;
        let cooled = state
            .last_scale_up
            .map_or(true, |at| now.duration_since(at) >= cfg.scale_up_cooldown);
        if cooled && headroom > 0 {
            let create = sessions_needed(metrics, cfg)
                .saturating_sub(total)
                .min(cfg.scale_up_batch)
                .min(headroom);
            if create > 0 {
                plan.create = create;
                state.last_scale_up = Some(now);
            }
        }
        return plan;
    }

    if utilization < cfg.scale_down_threshold && total > cfg.min_sessions {
        let since = *state.low_since.get_or_insert(now);
        if now.duration_since(since) >= cfg.scale_down_cooldown {
            let excess = total - cfg.min_sessions;
            let mut idle: Vec<&String> = sessions
                .iter()
                .filter(|(_, record)| record.active_games == 0)
                .map(|(id, _)| id)
                .collect();
            idle.sort_by(|a, b| runner_sort_key(b).cmp(&runner_sort_key(a)));
            plan.destroy = idle
                .into_iter()
                .take(excess.min(cfg.scale_down_batch) as usize)
                .cloned()
                .collect();
        }
    } else {
        state.low_since = None;
    }
    plan
}

/// Natural ordering for runner IDs so `session-10` outranks `session-9`.
fn runner_sort_key(id: &str) -> (u64, &str) {
    let numeric = id
        .rsplit('-')
        .next()
        .and_then(|suffix| suffix.parse::<u64>().ok())
        .unwrap_or(u64::MAX);
    (numeric, id)
}

/// Allocate `count` fresh `session-<n>` IDs above everything in use.
pub fn next_runner_ids(existing: &[String], count: u32) -> Vec<String> {
    let highest = existing
        .iter()
        .filter_map(|id| {
            id.strip_prefix("session-")
                .and_then(|suffix| suffix.parse::<u64>().ok())
        })
        .max()
        .unwrap_or(0);
    (1..=u64::from(count))
        .map(|offset| format!("session-{}", highest + offset))
        .collect()
}
