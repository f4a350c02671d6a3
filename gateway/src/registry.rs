//! Map of locally connected players to their outbound channels.

use matchpoint_types::ServerFrame;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

pub type Outbound = mpsc::UnboundedSender<ServerFrame>;

#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<String, Outbound>>>,
}

impl Registry {
    /// Bind a player to a connection. A reconnect replaces the previous
    /// binding; the old connection keeps draining but receives no further
    /// events.
    pub async fn register(&self, player_id: &str, tx: Outbound) {
        self.inner.write().await.insert(player_id.to_string(), tx);
    }

    /// Drop a binding, but only if it still points at this connection;
    /// a reconnect that already replaced it is left alone.
    pub async fn unregister(&self, player_id: &str, tx: &Outbound) {
        let mut inner = self.inner.write().await;
        if inner
            .get(player_id)
            .is_some_and(|bound| bound.same_channel(tx))
        {
            inner.remove(player_id);
        }
    }

    /// Deliver a frame if the player is connected here. Best-effort.
    pub async fn send(&self, player_id: &str, frame: ServerFrame) -> bool {
        let inner = self.inner.read().await;
        match inner.get(player_id) {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    pub async fn connected(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchpoint_types::PlayerState;

    #[tokio::test]
    async fn test_send_reaches_registered_player() {
        let registry = Registry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("p1", tx).await;

        assert!(
            registry
                .send(
                    "p1",
                    ServerFrame::State {
                        state: PlayerState::Ready
                    }
                )
                .await
        );
        assert!(matches!(
            rx.recv().await,
            Some(ServerFrame::State {
                state: PlayerState::Ready
            })
        ));
        assert!(!registry.send("p2", ServerFrame::error("X", "nope")).await);
    }

    #[tokio::test]
    async fn test_unregister_ignores_replaced_binding() {
        let registry = Registry::default();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        registry.register("p1", old_tx.clone()).await;
        registry.register("p1", new_tx).await;
        // The old connection closing must not evict the new binding.
        registry.unregister("p1", &old_tx).await;

        assert!(
            registry
                .send(
                    "p1",
                    ServerFrame::State {
                        state: PlayerState::InLobby
                    }
                )
                .await
        );
        assert!(new_rx.recv().await.is_some());
        assert_eq!(registry.connected().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_removes_own_binding() {
        let registry = Registry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register("p1", tx.clone()).await;
        registry.unregister("p1", &tx).await;
        assert_eq!(registry.connected().await, 0);
    }
}
