//! Store-backed reaper scenarios.
//!
//! Destructive: each test FLUSHes the database at `REDIS_URL`. Point it at
//! a disposable instance and run explicitly:
//!
//! ```text
//! REDIS_URL=redis://127.0.0.1:6379/15 \
//!     cargo test -p matchpoint-reaper -- --ignored --test-threads=1
//! ```

use matchpoint_reaper::{Config, Reaper};
use matchpoint_store::Store;
use matchpoint_types::{now_ms, PlayerRecord, PlayerState};

async fn fresh_store() -> Store {
    let url = std::env::var("REDIS_URL").expect("set REDIS_URL to a disposable redis");
    let client = redis::Client::open(url.as_str()).expect("redis url");
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .expect("redis connection");
    let _: () = redis::cmd("FLUSHDB")
        .query_async(&mut conn)
        .await
        .expect("flushdb");
    Store::connect(&url).await.expect("store connect")
}

async fn seed_player(store: &Store, id: &str, state: PlayerState, heartbeat_at: u64) {
    let record = PlayerRecord {
        state,
        heartbeat_at,
        game_id: None,
        session_id: None,
    };
    store.write_player(id, &record, 600).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a disposable redis at REDIS_URL"]
async fn test_silent_players_are_normalized() {
    let store = fresh_store().await;
    let now = now_ms();
    seed_player(&store, "fresh", PlayerState::Ready, now).await;
    seed_player(&store, "silent", PlayerState::Ready, now - 60_000).await;
    store
        .queue_push(&["fresh".into(), "silent".into()])
        .await
        .unwrap();

    let stats = Reaper::new(store.clone(), Config::default())
        .sweep()
        .await
        .unwrap();
    assert_eq!(stats.players_reset, 1);

    assert_eq!(store.queue_snapshot().await.unwrap(), vec!["fresh"]);
    assert_eq!(
        store.read_player("silent").await.unwrap().unwrap().state,
        PlayerState::InLobby
    );
    assert_eq!(
        store.read_player("fresh").await.unwrap().unwrap().state,
        PlayerState::Ready
    );
}

#[tokio::test]
#[ignore = "requires a disposable redis at REDIS_URL"]
async fn test_unready_queue_entries_are_swept() {
    let store = fresh_store().await;
    let now = now_ms();
    seed_player(&store, "lobbyist", PlayerState::InLobby, now).await;
    seed_player(&store, "ready", PlayerState::Ready, now).await;
    // A queue entry whose player record never existed.
    store
        .queue_push(&["lobbyist".into(), "ghost".into(), "ready".into()])
        .await
        .unwrap();

    let stats = Reaper::new(store.clone(), Config::default())
        .sweep()
        .await
        .unwrap();
    assert_eq!(stats.queue_removed, 2);
    assert_eq!(store.queue_snapshot().await.unwrap(), vec!["ready"]);
}

#[tokio::test]
#[ignore = "requires a disposable redis at REDIS_URL"]
async fn test_skip_in_game_leaves_linkage_alone() {
    let store = fresh_store().await;
    let now = now_ms();
    let record = PlayerRecord {
        state: PlayerState::InGame,
        heartbeat_at: now - 60_000,
        game_id: Some("g1".into()),
        session_id: Some("session-1".into()),
    };
    store.write_player("afk", &record, 600).await.unwrap();

    let cfg = Config {
        skip_in_game: true,
        ..Config::default()
    };
    Reaper::new(store.clone(), cfg).sweep().await.unwrap();
    let kept = store.read_player("afk").await.unwrap().unwrap();
    assert_eq!(kept.state, PlayerState::InGame);
    assert_eq!(kept.game_id.as_deref(), Some("g1"));

    // Default behavior resets the linkage even for IN_GAME players; the
    // session runner rewrites the record on finish.
    Reaper::new(store.clone(), Config::default())
        .sweep()
        .await
        .unwrap();
    let reset = store.read_player("afk").await.unwrap().unwrap();
    assert_eq!(reset.state, PlayerState::InLobby);
    assert_eq!(reset.game_id, None);
}
