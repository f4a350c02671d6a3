//! Session records, the availability index, and slot reservation.
//!
//! `sessions:available` holds a session iff it has free slots, scored by
//! that count. Reservation pops the best-scored member atomically, so a
//! slot can be momentarily invisible to other matchmakers but never handed
//! out twice; release restores it from the session record's truth.

use crate::{Store, StoreError};
use matchpoint_types::{keys, now_ms, SessionRecord};
use redis::AsyncCommands;
use std::collections::HashMap;

/// A slot claimed from `sessions:available`, to be released if the batch
/// it was claimed for never materializes.
#[derive(Debug, Clone)]
pub struct SlotReservation {
    pub session_id: String,
    /// Free-slot score the session carried before the claim.
    pub prev_score: u32,
}

impl Store {
    pub async fn read_session(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let mut conn = self.conn();
        let map: HashMap<String, String> = conn.hgetall(keys::session(id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(SessionRecord::from_map(&map))
    }

    /// Write a session record and synchronize its availability-index entry
    /// in one atomic group.
    pub async fn write_session(&self, id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let key = keys::session(id);
        let available = record.available_slots();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(&key, &record.to_fields())
            .ignore();
        if available > 0 {
            pipe.zadd(keys::SESSIONS_AVAILABLE, id, available).ignore();
        } else {
            pipe.zrem(keys::SESSIONS_AVAILABLE, id).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Remove a session record and its availability entry.
    pub async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = redis::pipe()
            .atomic()
            .del(keys::session(id))
            .ignore()
            .zrem(keys::SESSIONS_AVAILABLE, id)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Total free slots across the availability index.
    pub async fn available_total(&self) -> Result<u64, StoreError> {
        Ok(self
            .available_entries()
            .await?
            .into_iter()
            .map(|(_, score)| score as u64)
            .sum())
    }

    /// Every `(session_id, free_slots)` pair in the availability index.
    pub async fn available_entries(&self) -> Result<Vec<(String, u32)>, StoreError> {
        let mut conn = self.conn();
        let raw: Vec<(String, f64)> = conn
            .zrange_withscores(keys::SESSIONS_AVAILABLE, 0, -1)
            .await?;
        Ok(raw
            .into_iter()
            .map(|(id, score)| (id, score.max(0.0) as u32))
            .collect())
    }

    /// Claim one slot on the session with the most free slots and append
    /// the nascent game to its record. Returns `None` when no capacity is
    /// available.
    pub async fn reserve_slot(
        &self,
        game_id: &str,
    ) -> Result<Option<SlotReservation>, StoreError> {
        let mut conn = self.conn();
        let popped: Vec<(String, f64)> = redis::cmd("ZPOPMAX")
            .arg(keys::SESSIONS_AVAILABLE)
            .arg(1)
            .query_async(&mut conn)
            .await?;
        let Some((session_id, score)) = popped.into_iter().next() else {
            return Ok(None);
        };
        let prev_score = score.max(0.0) as u32;

        let Some(mut record) = self.read_session(&session_id).await? else {
            // Index pointed at a session that no longer exists; treat as
            // no capacity and let reconciliation clean the index.
            return Ok(None);
        };
        record.active_games = record.active_games.saturating_add(1);
        record.game_ids.push(game_id.to_string());
        record.updated_at = now_ms();

        let key = keys::session(&session_id);
        let available = record.available_slots();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(&key, &record.to_fields())
            .ignore();
        if available > 0 {
            pipe.zadd(keys::SESSIONS_AVAILABLE, &session_id, available)
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(Some(SlotReservation {
            session_id,
            prev_score,
        }))
    }

    /// Inverse of [`Store::reserve_slot`]: drop the game from the session
    /// record and put the slot back into the availability index.
    pub async fn release_slot(
        &self,
        reservation: &SlotReservation,
        game_id: &str,
    ) -> Result<(), StoreError> {
        let Some(mut record) = self.read_session(&reservation.session_id).await? else {
            return Ok(());
        };
        record.game_ids.retain(|id| id != game_id);
        record.active_games = record.active_games.saturating_sub(1);
        record.updated_at = now_ms();
        self.write_session(&reservation.session_id, &record).await
    }

    /// Scan every session record. Used by the capacity provider for
    /// metrics and reconciliation.
    pub async fn list_sessions(&self) -> Result<Vec<(String, SessionRecord)>, StoreError> {
        let mut conn = self.conn();
        let mut cursor = 0u64;
        let mut ids = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(keys::SESSION_SCAN_PATTERN)
                .arg("COUNT")
                .arg(64)
                .query_async(&mut conn)
                .await?;
            ids.extend(
                batch
                    .iter()
                    .filter_map(|key| keys::session_id_from_key(key))
                    .map(str::to_string),
            );
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.read_session(&id).await? {
                sessions.push((id, record));
            }
        }
        Ok(sessions)
    }
}
