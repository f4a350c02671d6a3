//! Picking N currently-ready players out of a queue of hints.
//!
//! Queue entries may be stale: the player unreadied, disconnected, or was
//! already placed. Head-pop plus tail-return keeps rough FIFO order while
//! draining stale entries lazily, bounds per-attempt work to `MAX_PULL`
//! pops, and never loses a live READY player.

use matchpoint_store::{Store, StoreError};
use matchpoint_types::PlayerState;
use std::collections::HashSet;

/// How many IDs to pop next: twice the remaining need, clamped to the
/// remaining pull budget.
pub fn pull_size(need: usize, picked: usize, inspected: usize, max_pull: usize) -> usize {
    let remaining_need = need.saturating_sub(picked);
    let budget = max_pull.saturating_sub(inspected);
    remaining_need.saturating_mul(2).min(budget)
}

/// Split one popped chunk against live states: READY players fill `picked`
/// up to `room`, further READY players overflow into the tail-return set,
/// everything else is discarded as stale.
pub fn classify_chunk(
    chunk: Vec<(String, Option<PlayerState>)>,
    room: usize,
) -> (Vec<String>, Vec<String>) {
    let mut picked = Vec::new();
    let mut overflow = Vec::new();
    for (id, state) in chunk {
        if state != Some(PlayerState::Ready) {
            continue;
        }
        if picked.len() < room {
            picked.push(id);
        } else {
            overflow.push(id);
        }
    }
    (picked, overflow)
}

/// Collect exactly `n` currently-ready players from the queue.
///
/// Returns `Ok(None)` on starvation, after pushing the partial pick back to
/// the tail; the caller must then release whatever slot it reserved.
pub async fn collect_batch(
    store: &Store,
    n: usize,
    max_pull: usize,
) -> Result<Option<Vec<String>>, StoreError> {
    let mut picked: Vec<String> = Vec::with_capacity(n);
    let mut to_return: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut inspected = 0usize;

    while picked.len() < n && inspected < max_pull {
        let want = pull_size(n, picked.len(), inspected, max_pull);
        let popped = store.queue_pop(want).await?;
        if popped.is_empty() {
            break;
        }
        inspected += popped.len();
        let states = store.read_player_states(&popped).await?;
        // Duplicate READY_UPs leave duplicate entries; the state check alone
        // cannot collapse them inside one attempt (the player is still
        // READY until materialization), so drop repeats here.
        let chunk: Vec<(String, Option<PlayerState>)> = popped
            .into_iter()
            .zip(states)
            .filter(|(id, _)| seen.insert(id.clone()))
            .collect();
        let (mut fresh, overflow) = classify_chunk(chunk, n - picked.len());
        picked.append(&mut fresh);
        to_return.extend(overflow);
    }

    if !to_return.is_empty() {
        store.queue_push(&to_return).await?;
    }
    if picked.len() < n {
        store.queue_push(&picked).await?;
        return Ok(None);
    }
    Ok(Some(picked))
}
