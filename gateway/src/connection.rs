//! Per-connection protocol handling.
//!
//! The HELLO handshake has a hard deadline; after it, frames are processed
//! one at a time in arrival order. Store errors inside handlers are logged
//! and swallowed so the player's next action retries; the connection only
//! closes on LEAVE, a missed handshake, or the socket going away.

use crate::Gateway;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use matchpoint_types::{mint_player_id, now_ms, ClientFrame, PlayerState, ServerFrame};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

enum Flow {
    Continue,
    Close,
}

pub async fn handle_socket(socket: WebSocket, gateway: Gateway) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let write_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(payload) = serde_json::to_string(&frame) else {
                continue;
            };
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let Some(player_id) = await_hello(&mut receiver, &tx, &gateway).await else {
        // No identity inside the window; the protocol error (if any) is
        // already queued, so let the writer drain and hang up.
        drop(tx);
        let _ = write_task.await;
        return;
    };

    gateway.registry.register(&player_id, tx.clone()).await;
    info!(player = %player_id, "player connected");

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => {
                if matches!(handle_frame(&gateway, &player_id, &text, &tx).await, Flow::Close) {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Monotone: a dropped connection must not yank a READY or IN_GAME
    // player back to the lobby.
    if let Err(err) = gateway
        .store
        .write_lobby_monotone(&player_id, gateway.cfg.player_ttl_s, now_ms())
        .await
    {
        warn!(player = %player_id, "disconnect write failed: {err}");
    }
    gateway.registry.unregister(&player_id, &tx).await;
    info!(player = %player_id, "player disconnected");
    drop(tx);
    let _ = write_task.await;
}

/// Wait for HELLO within the configured window. Returns the established
/// identity, or `None` if the connection should close.
async fn await_hello(
    receiver: &mut SplitStream<WebSocket>,
    tx: &mpsc::UnboundedSender<ServerFrame>,
    gateway: &Gateway,
) -> Option<String> {
    let deadline = Instant::now() + gateway.cfg.hello_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let message = match timeout(remaining, receiver.next()).await {
            Err(_) => {
                let _ = tx.send(ServerFrame::error(
                    "HELLO_TIMEOUT",
                    "no HELLO within the handshake window",
                ));
                return None;
            }
            Ok(None) => return None,
            Ok(Some(Err(_))) => return None,
            Ok(Some(Ok(message))) => message,
        };
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return None,
            _ => continue,
        };
        match ClientFrame::parse(&text) {
            Ok(ClientFrame::Hello { player_id }) => {
                let player_id = player_id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(mint_player_id);
                let state = match gateway
                    .store
                    .write_lobby_monotone(&player_id, gateway.cfg.player_ttl_s, now_ms())
                    .await
                {
                    Ok(state) => state,
                    Err(err) => {
                        warn!(player = %player_id, "hello write failed: {err}");
                        PlayerState::InLobby
                    }
                };
                let _ = tx.send(ServerFrame::Welcome {
                    player_id: player_id.clone(),
                });
                let _ = tx.send(ServerFrame::State { state });
                return Some(player_id);
            }
            Ok(_) => {
                let _ = tx.send(ServerFrame::error(
                    "HELLO_REQUIRED",
                    "identify with HELLO first",
                ));
            }
            Err(err) => {
                let _ = tx.send(ServerFrame::error(err.code(), err.to_string()));
            }
        }
    }
}

async fn handle_frame(
    gateway: &Gateway,
    player_id: &str,
    text: &str,
    tx: &mpsc::UnboundedSender<ServerFrame>,
) -> Flow {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(player = %player_id, "rejected frame: {err}");
            let _ = tx.send(ServerFrame::error(err.code(), err.to_string()));
            return Flow::Continue;
        }
    };

    let store = &gateway.store;
    let ttl = gateway.cfg.player_ttl_s;
    let now = now_ms();
    match frame {
        ClientFrame::Hello { .. } => {
            // Duplicate HELLO on an established connection: re-ack.
            let state = match store.write_lobby_monotone(player_id, ttl, now).await {
                Ok(state) => state,
                Err(err) => {
                    warn!(player = %player_id, "hello rewrite failed: {err}");
                    PlayerState::InLobby
                }
            };
            let _ = tx.send(ServerFrame::Welcome {
                player_id: player_id.to_string(),
            });
            let _ = tx.send(ServerFrame::State { state });
        }
        ClientFrame::ReadyUp => {
            let written = store
                .set_player_state(player_id, PlayerState::Ready, ttl, now)
                .await;
            let queued = store.queue_push(&[player_id.to_string()]).await;
            match (written, queued) {
                (Ok(()), Ok(())) => {
                    let _ = tx.send(ServerFrame::State {
                        state: PlayerState::Ready,
                    });
                }
                (written, queued) => {
                    if let Err(err) = written.and(queued) {
                        warn!(player = %player_id, "ready_up failed: {err}");
                    }
                }
            }
        }
        ClientFrame::Unready => {
            // Queue entries are left behind; consumers collapse them via
            // the state check.
            match store
                .set_player_state(player_id, PlayerState::InLobby, ttl, now)
                .await
            {
                Ok(()) => {
                    let _ = tx.send(ServerFrame::State {
                        state: PlayerState::InLobby,
                    });
                }
                Err(err) => warn!(player = %player_id, "unready failed: {err}"),
            }
        }
        ClientFrame::Heartbeat => {
            if let Err(err) = store.touch_heartbeat(player_id, ttl, now).await {
                warn!(player = %player_id, "heartbeat failed: {err}");
            }
        }
        ClientFrame::Leave => {
            match store
                .set_player_state(player_id, PlayerState::InLobby, ttl, now)
                .await
            {
                Ok(()) => {
                    let _ = tx.send(ServerFrame::State {
                        state: PlayerState::InLobby,
                    });
                }
                Err(err) => warn!(player = %player_id, "leave write failed: {err}"),
            }
            return Flow::Close;
        }
    }
    Flow::Continue
}
