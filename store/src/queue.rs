//! Ready-queue operations. The queue is FIFO: append at tail, take from
//! head. Entries are hints and are validated by consumers.

use crate::{Store, StoreError};
use matchpoint_types::keys;
use redis::AsyncCommands;
use std::num::NonZeroUsize;

impl Store {
    pub async fn queue_len(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn();
        Ok(conn.llen(keys::READY_QUEUE).await?)
    }

    /// Pop up to `count` IDs from the head.
    pub async fn queue_pop(&self, count: usize) -> Result<Vec<String>, StoreError> {
        let Some(count) = NonZeroUsize::new(count) else {
            return Ok(Vec::new());
        };
        let mut conn = self.conn();
        Ok(conn.lpop(keys::READY_QUEUE, Some(count)).await?)
    }

    /// Append IDs at the tail, preserving their relative order.
    pub async fn queue_push(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let _: () = conn.rpush(keys::READY_QUEUE, ids).await?;
        Ok(())
    }

    /// Value-based delete of every occurrence of an ID, immune to
    /// positional drift from concurrent pops.
    pub async fn queue_remove(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.lrem(keys::READY_QUEUE, 0, id).await?;
        Ok(())
    }

    /// Full snapshot, head first.
    pub async fn queue_snapshot(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        Ok(conn.lrange(keys::READY_QUEUE, 0, -1).await?)
    }
}
