#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for buzzer client integration tests.
//!
//! Provides a scripted [`MockTransport`], a [`MockConnector`] that hands out
//! one scripted transport per connect, and helpers for building server JSON.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use buzzer_client::protocol::{
    BoardPayload, CategoryPayload, DisabledCellPayload, PlayerScore, ServerMessage, WordPayload,
};
use buzzer_client::{BuzzerError, BuzzerEvent, Connector, Transport};

/// One scripted `recv()` result.
pub type Scripted = Option<Result<String, BuzzerError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted mock transport for integration testing.
///
/// Scripted server frames are consumed in order by `recv()`. All messages
/// sent by the client are recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Scripted>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(incoming: Vec<Scripted>) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self::with_handles(incoming, Arc::clone(&sent), Arc::clone(&closed));
        (transport, sent, closed)
    }

    fn with_handles(
        incoming: Vec<Scripted>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            incoming: VecDeque::from(incoming),
            sent,
            closed,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), BuzzerError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, BuzzerError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // Out of script: stay open until the client shuts down.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), BuzzerError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Hands out one scripted transport per `connect()`, all recording into the
/// same `sent` log. Once the scripts run out, every connect fails.
pub struct MockConnector {
    scripts: StdMutex<VecDeque<Vec<Scripted>>>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(scripts: Vec<Vec<Scripted>>) -> Self {
        Self {
            scripts: StdMutex::new(VecDeque::from(scripts)),
            sent: Arc::new(StdMutex::new(Vec::new())),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, BuzzerError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(incoming) => Ok(Box::new(MockTransport::with_handles(
                incoming,
                Arc::clone(&self.sent),
                Arc::new(AtomicBool::new(false)),
            ))),
            None => Err(BuzzerError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "no more scripted connections",
            ))),
        }
    }
}

// ── JSON helper functions ───────────────────────────────────────────

fn to_json(message: &ServerMessage) -> String {
    serde_json::to_string(message).expect("server message serialization")
}

/// A board of `categories` x `words` with point values 100, 200, ...
pub fn board_payload(categories: usize, words: usize) -> BoardPayload {
    BoardPayload {
        categories: (0..categories)
            .map(|c| CategoryPayload {
                name: format!("Category {c}"),
                words: (1..=words)
                    .map(|w| WordPayload {
                        point_value: u32::try_from(w * 100).unwrap(),
                    })
                    .collect(),
            })
            .collect(),
        disabled_cells: vec![],
    }
}

/// A `sync_board_state` frame for a fresh board.
pub fn snapshot_json(categories: usize, words: usize, score: u32) -> String {
    to_json(&ServerMessage::SyncBoardState {
        board: board_payload(categories, words),
        score,
    })
}

/// A `sync_board_state` frame with the given cells already used.
pub fn snapshot_with_disabled_json(
    categories: usize,
    words: usize,
    score: u32,
    disabled: &[(usize, usize)],
) -> String {
    let mut board = board_payload(categories, words);
    board.disabled_cells = disabled
        .iter()
        .map(|&(category_index, word_index)| DisabledCellPayload {
            category_index,
            word_index,
        })
        .collect();
    to_json(&ServerMessage::SyncBoardState { board, score })
}

pub fn board_update_json(category_index: usize, word_index: usize) -> String {
    to_json(&ServerMessage::BoardUpdate {
        category_index,
        word_index,
    })
}

pub fn scores_json(players: &[(&str, u32)]) -> String {
    to_json(&ServerMessage::ScoresUpdated {
        players: players
            .iter()
            .map(|&(name, score)| PlayerScore {
                name: name.into(),
                score,
            })
            .collect(),
    })
}

pub fn join_success_json() -> String {
    to_json(&ServerMessage::JoinSuccess)
}

pub fn start_game_json() -> String {
    to_json(&ServerMessage::StartGame)
}

pub fn next_turn_json() -> String {
    to_json(&ServerMessage::NextTurn)
}

pub fn buzzer_lock_json() -> String {
    to_json(&ServerMessage::BuzzerLock)
}

pub fn game_over_json(winner: &str) -> String {
    to_json(&ServerMessage::GameOver {
        winner_name: winner.into(),
    })
}

pub fn room_closed_json() -> String {
    to_json(&ServerMessage::RoomClosed)
}

pub fn error_json(message: &str) -> String {
    to_json(&ServerMessage::Error {
        message: message.into(),
    })
}

/// Wrap frames as successful scripted receives.
pub fn frames(items: impl IntoIterator<Item = String>) -> Vec<Scripted> {
    items.into_iter().map(|s| Some(Ok(s))).collect()
}

// ── Event helpers ───────────────────────────────────────────────────

/// Receive the next event, failing the test if none arrives within a second.
pub async fn next_event(rx: &mut tokio::sync::mpsc::Receiver<BuzzerEvent>) -> BuzzerEvent {
    tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Receive events until one matches `pred`, returning it.
pub async fn wait_for(
    rx: &mut tokio::sync::mpsc::Receiver<BuzzerEvent>,
    pred: impl Fn(&BuzzerEvent) -> bool,
) -> BuzzerEvent {
    loop {
        let ev = next_event(rx).await;
        if pred(&ev) {
            return ev;
        }
    }
}
