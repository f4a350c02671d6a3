//! Topic publication and a reconnecting subscriber loop.

use crate::{Store, StoreError};
use futures::StreamExt;
use matchpoint_types::MatchEvent;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

impl Store {
    /// Publish a match event to a topic. Fan-out is best-effort: events are
    /// advisory and the record writes they describe have already landed.
    pub async fn publish_event(&self, topic: &str, event: &MatchEvent) -> Result<(), StoreError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn();
        let _: () = conn.publish(topic, payload).await?;
        Ok(())
    }
}

/// Spawn a subscriber that forwards `(topic, event)` pairs until the
/// receiver side is dropped, reconnecting with a fixed delay on failure.
pub fn spawn_event_subscriber(
    client: redis::Client,
    topics: Vec<String>,
    tx: mpsc::UnboundedSender<(String, MatchEvent)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = run_subscriber(&client, &topics, &tx).await {
                warn!("event subscriber error: {err}");
            }
            if tx.is_closed() {
                break;
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

async fn run_subscriber(
    client: &redis::Client,
    topics: &[String],
    tx: &mpsc::UnboundedSender<(String, MatchEvent)>,
) -> Result<(), StoreError> {
    let mut pubsub = client.get_async_pubsub().await?;
    for topic in topics {
        pubsub.subscribe(topic).await?;
    }
    let mut stream = pubsub.on_message();
    while let Some(message) = stream.next().await {
        let topic = message.get_channel_name().to_string();
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%topic, "event payload read failed: {err}");
                continue;
            }
        };
        match serde_json::from_str::<MatchEvent>(&payload) {
            Ok(event) => {
                if tx.send((topic, event)).is_err() {
                    return Ok(());
                }
            }
            Err(err) => warn!(%topic, "event decode failed: {err}"),
        }
    }
    Ok(())
}
