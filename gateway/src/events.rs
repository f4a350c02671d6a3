//! Lifecycle-event forwarding: store topics in, per-player frames out.

use crate::{Gateway, Registry};
use matchpoint_store::spawn_event_subscriber;
use matchpoint_types::{keys, MatchEvent, PlayerState, ServerFrame};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// The frame pair a player receives for an event on the given topic, or
/// `None` for topics the gateway does not forward.
pub fn frames_for(topic: &str, event: &MatchEvent) -> Option<[ServerFrame; 2]> {
    match topic {
        keys::MATCH_FOUND => Some([
            ServerFrame::MatchFound {
                game_id: event.game_id.clone(),
                session_id: event.session_id.clone(),
            },
            ServerFrame::State {
                state: PlayerState::InGame,
            },
        ]),
        keys::MATCH_ENDED => Some([
            ServerFrame::MatchEnded {
                game_id: event.game_id.clone(),
                session_id: event.session_id.clone(),
            },
            ServerFrame::State {
                state: PlayerState::InLobby,
            },
        ]),
        _ => None,
    }
}

/// Subscribe to both match topics and forward each event to whichever of
/// its players are connected to this gateway. Delivery is best-effort;
/// players connected elsewhere are silently skipped.
pub fn spawn_event_forwarder(gateway: Gateway) -> JoinHandle<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscriber = spawn_event_subscriber(
        gateway.store.client().clone(),
        vec![keys::MATCH_FOUND.to_string(), keys::MATCH_ENDED.to_string()],
        tx,
    );
    tokio::spawn(async move {
        while let Some((topic, event)) = rx.recv().await {
            forward(&gateway.registry, &topic, &event).await;
        }
        subscriber.abort();
    })
}

async fn forward(registry: &Registry, topic: &str, event: &MatchEvent) {
    let Some(frames) = frames_for(topic, event) else {
        return;
    };
    let mut delivered = 0usize;
    for player_id in &event.player_ids {
        let [first, second] = frames.clone();
        if registry.send(player_id, first).await {
            registry.send(player_id, second).await;
            delivered += 1;
        }
    }
    debug!(
        %topic,
        game = %event.game_id,
        delivered,
        of = event.player_ids.len(),
        "event forwarded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> MatchEvent {
        MatchEvent {
            game_id: "g1".into(),
            session_id: "session-1".into(),
            player_ids: vec!["a".into(), "b".into()],
        }
    }

    #[test]
    fn test_match_found_frames() {
        let [first, second] = frames_for(keys::MATCH_FOUND, &event()).unwrap();
        assert!(matches!(first, ServerFrame::MatchFound { .. }));
        assert!(matches!(
            second,
            ServerFrame::State {
                state: PlayerState::InGame
            }
        ));
    }

    #[test]
    fn test_match_ended_frames() {
        let [first, second] = frames_for(keys::MATCH_ENDED, &event()).unwrap();
        assert!(matches!(first, ServerFrame::MatchEnded { .. }));
        assert!(matches!(
            second,
            ServerFrame::State {
                state: PlayerState::InLobby
            }
        ));
    }

    #[test]
    fn test_unknown_topic_is_ignored() {
        assert!(frames_for("events:other", &event()).is_none());
    }

    #[tokio::test]
    async fn test_forward_skips_players_connected_elsewhere() {
        let registry = Registry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("a", tx).await;

        forward(&registry, keys::MATCH_FOUND, &event()).await;

        // Player "a" gets the pair; "b" is not here and is skipped.
        assert!(matches!(
            rx.recv().await,
            Some(ServerFrame::MatchFound { .. })
        ));
        assert!(matches!(rx.recv().await, Some(ServerFrame::State { .. })));
        assert!(rx.try_recv().is_err());
    }
}
