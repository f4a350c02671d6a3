//! Coordination-store client.
//!
//! Thin typed layer over redis exposing exactly the primitives the roles
//! coordinate through: hash records, the ready queue, the availability
//! sorted set, TTL locks, pipelined write groups, and pub/sub topics.
//! Every method clones the underlying [`redis::aio::ConnectionManager`],
//! which multiplexes one reconnecting connection per process.

mod games;
mod players;
mod pubsub;
mod queue;
mod sessions;

pub use pubsub::spawn_event_subscriber;
pub use sessions::SlotReservation;

use redis::aio::ConnectionManager;
use thiserror::Error;

/// Resolve the store location from `REDIS_URL`, falling back to
/// `REDIS_HOST`/`REDIS_PORT`.
pub fn url_from_env() -> String {
    if let Ok(url) = std::env::var("REDIS_URL") {
        if !url.trim().is_empty() {
            return url;
        }
    }
    let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("REDIS_PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(6379);
    format!("redis://{host}:{port}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("event encode: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Handle to the coordination store. Cheap to clone; all clones share one
/// multiplexed connection.
#[derive(Clone)]
pub struct Store {
    client: redis::Client,
    conn: ConnectionManager,
}

impl Store {
    /// Connect eagerly. Roles treat a failure here as fatal; once connected
    /// the manager reconnects on its own.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { client, conn })
    }

    /// The underlying client, used to open dedicated pub/sub connections.
    pub fn client(&self) -> &redis::Client {
        &self.client
    }

    pub(crate) fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Set-if-absent with TTL. Returns whether this caller now holds the
    /// lock. Locks are left to expire unless [`Store::unlock`] is called.
    pub async fn try_lock(&self, key: &str, token: &str, ttl_ms: u64) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    /// Release a lock if this caller still holds it. Advisory only: the
    /// read-then-delete pair is not atomic, which is acceptable for locks
    /// that bound waste rather than guard correctness.
    pub async fn unlock(&self, key: &str, token: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let current: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        if current.as_deref() == Some(token) {
            let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        }
        Ok(())
    }
}
