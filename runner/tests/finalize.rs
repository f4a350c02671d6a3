//! Store-backed session-runner scenarios, including the finish race.
//!
//! Destructive: each test FLUSHes the database at `REDIS_URL`. Point it at
//! a disposable instance and run explicitly:
//!
//! ```text
//! REDIS_URL=redis://127.0.0.1:6379/15 \
//!     cargo test -p matchpoint-runner -- --ignored --test-threads=1
//! ```

use futures::StreamExt;
use matchpoint_runner::{Config, SessionRunner};
use matchpoint_store::Store;
use matchpoint_types::{
    keys, now_ms, GameRecord, GameState, MatchEvent, PlayerRecord, PlayerState, SessionRecord,
};
use std::time::Duration;

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

/// Seed one RUNNING game on the session, already past its end time.
async fn seed_ended_game(store: &Store, session_id: &str, game_id: &str, players: &[&str]) {
    let now = now_ms();
    for id in players {
        let record = PlayerRecord {
            state: PlayerState::InGame,
            heartbeat_at: now,
            game_id: Some(game_id.to_string()),
            session_id: Some(session_id.to_string()),
        };
        store.write_player(id, &record, 600).await.unwrap();
    }
    let game = GameRecord {
        session_id: session_id.to_string(),
        state: GameState::Running,
        started_at: now.saturating_sub(60_000),
        end_at: Some(now.saturating_sub(1_000)),
        finished_at: None,
    };
    let player_ids: Vec<String> = players.iter().map(|id| id.to_string()).collect();
    store
        .materialize_game(game_id, &game, &player_ids, 600)
        .await
        .unwrap();
    let record = SessionRecord {
        max_slots: 1,
        active_games: 1,
        game_ids: vec![game_id.to_string()],
        updated_at: now,
    };
    store.write_session(session_id, &record).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a disposable redis at REDIS_URL"]
async fn test_ended_game_is_finalized_once() {
    let store = fresh_store().await;
    seed_ended_game(&store, "session-1", "g1", &["a", "b"]).await;

    // Count match_ended publications over a dedicated subscription.
    let mut pubsub = store.client().get_async_pubsub().await.unwrap();
    pubsub.subscribe(keys::MATCH_ENDED).await.unwrap();

    // Two runners share the session record, as after a crash overlap.
    let mut first = SessionRunner::start(store.clone(), Config::default(), "session-1".into())
        .await
        .unwrap();
    let mut second = SessionRunner::start(store.clone(), Config::default(), "session-1".into())
        .await
        .unwrap();
    assert_eq!(first.tracked(), &["g1"]);

    first.tick().await.unwrap();
    second.tick().await.unwrap();

    let game = store.read_game("g1").await.unwrap().unwrap();
    assert_eq!(game.state, GameState::Finished);
    assert!(game.finished_at.is_some());

    let session = store.read_session("session-1").await.unwrap().unwrap();
    assert_eq!(session.active_games, 0);
    assert!(session.game_ids.is_empty());
    assert_eq!(
        store.available_entries().await.unwrap(),
        vec![("session-1".to_string(), session.max_slots)]
    );

    for id in ["a", "b"] {
        let record = store.read_player(id).await.unwrap().unwrap();
        assert_eq!(record.state, PlayerState::InLobby);
        assert_eq!(record.game_id, None);
        assert_eq!(record.session_id, None);
    }

    // Exactly one event; a second would arrive well within the timeout.
    let mut stream = pubsub.on_message();
    let first_event = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("first match_ended")
        .unwrap();
    let payload: String = first_event.get_payload().unwrap();
    let event: MatchEvent = serde_json::from_str(&payload).unwrap();
    assert_eq!(event.game_id, "g1");
    assert!(
        tokio::time::timeout(Duration::from_millis(500), stream.next())
            .await
            .is_err(),
        "game finalized more than once"
    );
}

#[tokio::test]
#[ignore = "requires a disposable redis at REDIS_URL"]
async fn test_contended_finish_lock_yields() {
    let store = fresh_store().await;
    seed_ended_game(&store, "session-1", "g1", &["a"]).await;

    // Someone else holds the finish lock.
    assert!(store
        .try_lock(&keys::finish_lock("g1"), "other-runner", 5_000)
        .await
        .unwrap());

    let mut runner = SessionRunner::start(store.clone(), Config::default(), "session-1".into())
        .await
        .unwrap();
    assert!(!runner.try_finalize("g1").await.unwrap());

    let game = store.read_game("g1").await.unwrap().unwrap();
    assert_eq!(game.state, GameState::Running);
    assert_eq!(
        store.read_player("a").await.unwrap().unwrap().state,
        PlayerState::InGame
    );
}

#[tokio::test]
#[ignore = "requires a disposable redis at REDIS_URL"]
async fn test_handed_off_game_is_adopted() {
    let store = fresh_store().await;
    let mut runner = SessionRunner::start(store.clone(), Config::default(), "session-1".into())
        .await
        .unwrap();
    assert!(runner.tracked().is_empty());

    // Matchmaker-style handoff: reserve against the published availability.
    let reservation = store.reserve_slot("g1").await.unwrap().unwrap();
    assert_eq!(reservation.session_id, "session-1");
    let now = now_ms();
    let game = GameRecord {
        session_id: "session-1".to_string(),
        state: GameState::Running,
        started_at: now,
        end_at: Some(now + 60_000),
        finished_at: None,
    };
    store
        .materialize_game("g1", &game, &["a".to_string()], 600)
        .await
        .unwrap();

    runner.tick().await.unwrap();
    assert_eq!(runner.tracked(), &["g1"]);
    // Still running: nothing finalized yet.
    assert_eq!(
        store.read_game("g1").await.unwrap().unwrap().state,
        GameState::Running
    );
}

#[tokio::test]
#[ignore = "requires a disposable redis at REDIS_URL"]
async fn test_record_without_end_time_finalizes_on_sight() {
    let store = fresh_store().await;
    seed_ended_game(&store, "session-1", "g1", &["a"]).await;
    // Strip the end time to simulate a half-written record.
    let mut conn = store
        .client()
        .get_multiplexed_async_connection()
        .await
        .unwrap();
    let _: () = redis::cmd("HDEL")
        .arg(keys::game("g1"))
        .arg("end_at")
        .query_async(&mut conn)
        .await
        .unwrap();

    let mut runner = SessionRunner::start(store.clone(), Config::default(), "session-1".into())
        .await
        .unwrap();
    runner.tick().await.unwrap();

    assert_eq!(
        store.read_game("g1").await.unwrap().unwrap().state,
        GameState::Finished
    );
}

#[tokio::test]
#[ignore = "requires a disposable redis at REDIS_URL"]
async fn test_crash_recovery_readopts_running_games() {
    let store = fresh_store().await;
    let now = now_ms();
    seed_ended_game(&store, "session-1", "g1", &["a"]).await;
    // Push the end time back out so the game is mid-flight.
    let game = GameRecord {
        session_id: "session-1".to_string(),
        state: GameState::Running,
        started_at: now,
        end_at: Some(now + 120_000),
        finished_at: None,
    };
    store
        .materialize_game("g1", &game, &["a".to_string()], 600)
        .await
        .unwrap();

    let runner = SessionRunner::start(store.clone(), Config::default(), "session-1".into())
        .await
        .unwrap();
    assert_eq!(runner.tracked(), &["g1"]);
    let session = store.read_session("session-1").await.unwrap().unwrap();
    assert_eq!(session.active_games, 1);
    assert_eq!(session.game_ids, vec!["g1"]);
}
