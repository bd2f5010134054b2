#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style client tests for the buzzer client.
//!
//! Uses the shared `MockTransport` / `MockConnector` from `tests/common` to
//! script server frames and verify that `BuzzerClient` processes them
//! correctly: store transitions, outbound intents, and event delivery.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use buzzer_client::dispatch::{CONNECTION_LOST_NOTICE, ROOM_CLOSED_NOTICE};
use buzzer_client::reconnect::ExponentialBackoff;
use buzzer_client::{
    BuzzerClient, BuzzerConfig, BuzzerError, BuzzerEvent, CellAddress, ClientMessage, ClientState,
    ConnectionPhase, JoinIntent, TurnPhase,
};
use tokio_test::{assert_err, assert_ok};

use common::{
    board_update_json, buzzer_lock_json, error_json, frames, game_over_json, join_success_json,
    next_event, next_turn_json, room_closed_json, scores_json, snapshot_json,
    snapshot_with_disabled_json, start_game_json, wait_for, MockConnector, MockTransport, Scripted,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

#[allow(clippy::type_complexity)]
fn start_client(
    incoming: Vec<Scripted>,
) -> (
    BuzzerClient,
    tokio::sync::mpsc::Receiver<BuzzerEvent>,
    Arc<StdMutex<Vec<String>>>,
    Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let intent = JoinIntent::new("ABCD", "Bob").expect("valid intent");
    let (client, events) = BuzzerClient::start(transport, intent, BuzzerConfig::new());
    (client, events, sent, closed)
}

fn sent_messages(sent: &StdMutex<Vec<String>>) -> Vec<ClientMessage> {
    sent.lock()
        .expect("sent lock")
        .iter()
        .map(|s| serde_json::from_str(s).expect("client message JSON"))
        .collect()
}

/// Wait until the client has sent `count` frames.
async fn wait_for_sent(sent: &StdMutex<Vec<String>>, count: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while sent.lock().expect("sent lock").len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for outbound frame");
}

fn join_bob() -> ClientMessage {
    ClientMessage::JoinRoom {
        code: "ABCD".into(),
        name: "Bob".into(),
        picture: None,
    }
}

fn fast_backoff(max_attempts: u32) -> ExponentialBackoff {
    ExponentialBackoff {
        initial: Duration::from_millis(10),
        max: Duration::from_millis(20),
        multiplier: 2,
        max_attempts,
    }
}

// ════════════════════════════════════════════════════════════════════
// Joining
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn join_sends_intent_first_and_board_sync_rebuilds_store() {
    let (mut client, mut events, sent, _closed) = start_client(frames([
        join_success_json(),
        start_game_json(),
        snapshot_json(2, 2, 0),
    ]));

    assert_eq!(next_event(&mut events).await, BuzzerEvent::Connected);
    assert_eq!(next_event(&mut events).await, BuzzerEvent::Joined);
    assert_eq!(next_event(&mut events).await, BuzzerEvent::GameStarted);
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::BoardSynced { score: 0 }
    );

    assert_eq!(sent_messages(&sent), vec![join_bob()]);

    let state = client.state().await;
    let game = state.game().expect("in game");
    let board = game.board().expect("board");
    assert_eq!(board.len(), 4);
    assert_eq!(board.category_count(), 2);
    assert_eq!(game.score(), 0);
    assert_eq!(game.turn(), TurnPhase::AwaitingTurn);
    assert_eq!(game.session().connection_phase(), ConnectionPhase::Connected);
    assert!(!client.can_buzz().await);

    client.shutdown().await;
}

#[tokio::test]
async fn join_intent_carries_picture_as_null_when_absent() {
    let (mut client, mut events, sent, _closed) = start_client(vec![]);
    assert_eq!(next_event(&mut events).await, BuzzerEvent::Connected);

    let raw: serde_json::Value =
        serde_json::from_str(&sent.lock().expect("sent lock")[0]).expect("json");
    assert_eq!(raw["type"], "join_room");
    assert_eq!(raw["code"], "ABCD");
    assert_eq!(raw["name"], "Bob");
    assert!(raw["picture"].is_null());

    client.shutdown().await;
}

#[tokio::test]
async fn connect_failure_creates_no_session() {
    let connector = MockConnector::new(vec![]);
    let intent = JoinIntent::new("ABCD", "Bob").expect("valid intent");
    let err = assert_err!(BuzzerClient::connect(connector, intent, BuzzerConfig::new()).await);
    assert!(matches!(err, BuzzerError::Io(_)));
}

// ════════════════════════════════════════════════════════════════════
// Buzzing
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn buzz_sends_once_then_locks_until_next_turn() {
    let (mut client, mut events, sent, _closed) =
        start_client(frames([snapshot_json(2, 2, 0), next_turn_json()]));

    wait_for(&mut events, |e| *e == BuzzerEvent::BuzzerOpened).await;
    assert!(client.can_buzz().await);

    assert_ok!(client.buzz().await);
    assert!(!client.can_buzz().await);
    let err = assert_err!(client.buzz().await);
    assert!(matches!(err, BuzzerError::BuzzerNotOpen));

    wait_for_sent(&sent, 2).await;
    assert_eq!(
        sent_messages(&sent),
        vec![join_bob(), ClientMessage::Buzz { name: "Bob".into() }]
    );

    client.shutdown().await;
}

#[tokio::test]
async fn buzz_while_locked_sends_nothing() {
    let (mut client, mut events, sent, _closed) = start_client(frames([
        snapshot_json(2, 2, 0),
        next_turn_json(),
        buzzer_lock_json(),
    ]));

    wait_for(&mut events, |e| *e == BuzzerEvent::BuzzerLocked).await;
    let err = assert_err!(client.buzz().await);
    assert!(matches!(err, BuzzerError::BuzzerNotOpen));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(sent_messages(&sent), vec![join_bob()]);
    let state = client.state().await;
    assert_eq!(state.game().expect("in game").turn(), TurnPhase::BuzzerLocked);

    client.shutdown().await;
}

#[tokio::test]
async fn own_buzz_keeps_buzzer_locked() {
    let (transport, sent, _closed) = MockTransport::new(frames([next_turn_json()]));
    let intent = JoinIntent::new("ABCD", "Bob").expect("valid intent");
    let (mut client, mut events) = BuzzerClient::start(transport, intent, BuzzerConfig::new());

    wait_for(&mut events, |e| *e == BuzzerEvent::BuzzerOpened).await;
    assert_ok!(client.buzz().await);
    wait_for_sent(&sent, 2).await;
    assert!(!client.can_buzz().await);
    let state = client.state().await;
    assert!(state.game().expect("in game").has_buzzed());

    client.shutdown().await;
}

#[tokio::test]
async fn buzz_after_shutdown_is_not_connected() {
    let (mut client, mut events, _sent, _closed) = start_client(frames([next_turn_json()]));
    wait_for(&mut events, |e| *e == BuzzerEvent::BuzzerOpened).await;

    client.shutdown().await;
    let err = assert_err!(client.buzz().await);
    assert!(matches!(err, BuzzerError::NotConnected));
}

// ════════════════════════════════════════════════════════════════════
// Board and scores
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn board_update_disables_one_cell() {
    let (mut client, mut events, _sent, _closed) = start_client(frames([
        snapshot_with_disabled_json(3, 2, 0, &[(0, 0)]),
        board_update_json(2, 1),
        // Already disabled: no event.
        board_update_json(2, 1),
        next_turn_json(),
    ]));

    assert_eq!(
        wait_for(&mut events, |e| matches!(e, BuzzerEvent::CellDisabled { .. })).await,
        BuzzerEvent::CellDisabled {
            address: CellAddress::new(2, 1)
        }
    );
    assert_eq!(next_event(&mut events).await, BuzzerEvent::BuzzerOpened);

    let state = client.state().await;
    let board = state.game().and_then(|g| g.board()).expect("board");
    assert_eq!(
        board.disabled_cells(),
        vec![CellAddress::new(0, 0), CellAddress::new(2, 1)]
    );

    client.shutdown().await;
}

#[tokio::test]
async fn scores_match_local_player_case_insensitively() {
    let (mut client, mut events, _sent, _closed) = start_client(frames([
        snapshot_json(1, 1, 0),
        scores_json(&[("alice", 300), ("BOB", 200)]),
        scores_json(&[("alice", 500)]),
    ]));

    assert_eq!(
        wait_for(&mut events, |e| matches!(e, BuzzerEvent::ScoresUpdated { .. })).await,
        BuzzerEvent::ScoresUpdated { score: Some(200) }
    );
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::ScoresUpdated { score: None }
    );

    let state = client.state().await;
    let game = state.game().expect("in game");
    assert_eq!(game.score(), 200);
    assert_eq!(game.roster().len(), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn malformed_and_unknown_frames_are_skipped() {
    let (mut client, mut events, _sent, _closed) = start_client(frames([
        "not json".to_string(),
        r#"{"type":"confetti"}"#.to_string(),
        r#"{"type":"sync_board_state","board":{"categories":[]},"score":-5}"#.to_string(),
        next_turn_json(),
    ]));

    assert_eq!(next_event(&mut events).await, BuzzerEvent::Connected);
    assert_eq!(next_event(&mut events).await, BuzzerEvent::BuzzerOpened);
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn game_over_records_outcome() {
    let (mut client, mut events, _sent, _closed) =
        start_client(frames([next_turn_json(), game_over_json("bob")]));

    assert_eq!(
        wait_for(&mut events, |e| matches!(e, BuzzerEvent::GameOver { .. })).await,
        BuzzerEvent::GameOver {
            winner: "bob".into(),
            won: true
        }
    );
    let state = client.state().await;
    let game = state.game().expect("in game");
    assert_eq!(game.turn(), TurnPhase::GameOver);
    assert!(game.outcome().expect("outcome").won);
    assert!(!client.can_buzz().await);

    // Acknowledging the result discards the session.
    client.shutdown().await;
    assert_eq!(client.state().await, ClientState::default());
}

// ════════════════════════════════════════════════════════════════════
// Session end
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn room_closed_returns_to_join_from_any_phase() {
    for prefix in [
        vec![],
        vec![snapshot_json(2, 2, 0)],
        vec![snapshot_json(2, 2, 0), next_turn_json()],
        vec![next_turn_json(), buzzer_lock_json()],
        vec![game_over_json("alice")],
    ] {
        let mut script = prefix;
        script.push(room_closed_json());
        let (client, mut events, _sent, closed) = start_client(frames(script));

        assert_eq!(
            wait_for(&mut events, |e| matches!(e, BuzzerEvent::ReturnedToJoin { .. })).await,
            BuzzerEvent::ReturnedToJoin {
                notice: ROOM_CLOSED_NOTICE.into()
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            BuzzerEvent::Disconnected {
                reason: Some(ROOM_CLOSED_NOTICE.into())
            }
        );
        assert!(events.recv().await.is_none());
        assert!(closed.load(Ordering::Relaxed));
        assert!(!client.is_connected());
        assert_eq!(client.state().await.notice(), Some(ROOM_CLOSED_NOTICE));
        assert_eq!(
            client.connection_phase().await,
            ConnectionPhase::Disconnected
        );
    }
}

#[tokio::test]
async fn server_error_message_is_shown_verbatim() {
    let (client, mut events, _sent, closed) =
        start_client(frames([error_json("Room not found.")]));

    assert_eq!(next_event(&mut events).await, BuzzerEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::ReturnedToJoin {
            notice: "Room not found.".into()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::Disconnected {
            reason: Some("Room not found.".into())
        }
    );
    assert!(closed.load(Ordering::Relaxed));
    assert_eq!(client.state().await.notice(), Some("Room not found."));
}

#[tokio::test]
async fn transport_loss_without_reconnect_returns_to_join() {
    let (client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(snapshot_json(2, 2, 100))),
        Some(Err(BuzzerError::TransportReceive("reset by peer".into()))),
    ]);

    wait_for(&mut events, |e| matches!(e, BuzzerEvent::BoardSynced { .. })).await;
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::ReturnedToJoin {
            notice: CONNECTION_LOST_NOTICE.into()
        }
    );
    let ev = next_event(&mut events).await;
    let BuzzerEvent::Disconnected { reason: Some(reason) } = ev else {
        panic!("expected Disconnected with a reason, got {ev:?}");
    };
    assert!(reason.contains("reset by peer"));
    assert!(events.recv().await.is_none());

    // Server-derived state is gone.
    let state = client.state().await;
    assert!(state.game().is_none());
    assert_eq!(state.notice(), Some(CONNECTION_LOST_NOTICE));
}

#[tokio::test]
async fn clean_server_close_is_a_lost_connection() {
    let (_client, mut events, _sent, _closed) = start_client(vec![None]);

    assert_eq!(next_event(&mut events).await, BuzzerEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::ReturnedToJoin {
            notice: CONNECTION_LOST_NOTICE.into()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::Disconnected { reason: None }
    );
}

#[tokio::test]
async fn full_event_channel_drops_events_but_not_disconnected() {
    let (transport, _sent, _closed) = MockTransport::new(frames(
        std::iter::repeat_with(next_turn_json)
            .take(10)
            .chain([room_closed_json()]),
    ));
    let intent = JoinIntent::new("ABCD", "Bob").expect("valid intent");
    let config = BuzzerConfig::new().with_event_channel_capacity(1);
    let (_client, mut events) = BuzzerClient::start(transport, intent, config);

    // Let the loop run ahead of the consumer.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut received = Vec::new();
    while let Some(ev) = events.recv().await {
        received.push(ev);
    }
    assert!(received.len() < 13);
    assert!(matches!(
        received.last(),
        Some(BuzzerEvent::Disconnected { .. })
    ));
}

// ════════════════════════════════════════════════════════════════════
// Reconnect
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn reconnect_resends_join_and_waits_for_snapshot() {
    let connector = MockConnector::new(vec![
        vec![Some(Ok(snapshot_json(2, 2, 300))), None],
        frames([snapshot_json(2, 2, 300)]),
    ]);
    let sent = Arc::clone(&connector.sent);
    let connects = Arc::clone(&connector.connects);
    let intent = JoinIntent::new("abcd", "Bob").expect("valid intent");
    let config = BuzzerConfig::new().with_reconnect(fast_backoff(3));
    let (mut client, mut events) = assert_ok!(BuzzerClient::connect(connector, intent, config).await);

    assert_eq!(next_event(&mut events).await, BuzzerEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::BoardSynced { score: 300 }
    );
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(10)
        }
    );

    assert_eq!(next_event(&mut events).await, BuzzerEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::BoardSynced { score: 300 }
    );

    assert_eq!(connects.load(Ordering::Relaxed), 2);
    assert_eq!(sent_messages(&sent), vec![join_bob(), join_bob()]);
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn reconnect_gives_up_after_policy_is_exhausted() {
    let connector = MockConnector::new(vec![vec![None]]);
    let intent = JoinIntent::new("ABCD", "Bob").expect("valid intent");
    let config = BuzzerConfig::new().with_reconnect(fast_backoff(2));
    let (client, mut events) = assert_ok!(BuzzerClient::connect(connector, intent, config).await);

    assert_eq!(next_event(&mut events).await, BuzzerEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(10)
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::Reconnecting {
            attempt: 2,
            delay: Duration::from_millis(20)
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::ReturnedToJoin {
            notice: CONNECTION_LOST_NOTICE.into()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::Disconnected { reason: None }
    );
    assert_eq!(client.state().await.notice(), Some(CONNECTION_LOST_NOTICE));
}

#[tokio::test]
async fn room_closed_is_never_retried() {
    let connector = MockConnector::new(vec![frames([room_closed_json()]), vec![]]);
    let connects = Arc::clone(&connector.connects);
    let intent = JoinIntent::new("ABCD", "Bob").expect("valid intent");
    let config = BuzzerConfig::new().with_reconnect(fast_backoff(5));
    let (_client, mut events) = assert_ok!(BuzzerClient::connect(connector, intent, config).await);

    let ev = wait_for(&mut events, |e| matches!(e, BuzzerEvent::Disconnected { .. })).await;
    assert_eq!(
        ev,
        BuzzerEvent::Disconnected {
            reason: Some(ROOM_CLOSED_NOTICE.into())
        }
    );
    assert_eq!(connects.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn shutdown_during_backoff_stops_reconnecting() {
    let connector = MockConnector::new(vec![vec![None]]);
    let connects = Arc::clone(&connector.connects);
    let intent = JoinIntent::new("ABCD", "Bob").expect("valid intent");
    let config = BuzzerConfig::new().with_reconnect(ExponentialBackoff {
        initial: Duration::from_secs(30),
        max: Duration::from_secs(30),
        multiplier: 1,
        max_attempts: 3,
    });
    let (mut client, mut events) =
        assert_ok!(BuzzerClient::connect(connector, intent, config).await);

    wait_for(&mut events, |e| matches!(e, BuzzerEvent::Reconnecting { .. })).await;
    client.shutdown().await;

    assert_eq!(
        next_event(&mut events).await,
        BuzzerEvent::Disconnected {
            reason: Some("client shut down".into())
        }
    );
    assert_eq!(connects.load(Ordering::Relaxed), 1);
    assert_eq!(client.state().await, ClientState::default());
}
