//! Wire-compatible protocol types for the buzzer game server.
//!
//! Every message is a JSON object carrying a `type` discriminator. Field
//! names inside server payloads are camelCase (`categoryIndex`,
//! `winnerName`); the discriminator values are snake_case.

use serde::{Deserialize, Serialize};

// ── Structs ─────────────────────────────────────────────────────────

/// One word (clue) on the board as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPayload {
    /// Points awarded for this word.
    #[serde(rename = "pointValue")]
    pub point_value: u32,
}

/// One board column as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPayload {
    pub name: String,
    pub words: Vec<WordPayload>,
}

/// Address of a cell the server reports as already played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledCellPayload {
    #[serde(rename = "categoryIndex")]
    pub category_index: usize,
    #[serde(rename = "wordIndex")]
    pub word_index: usize,
}

/// Complete board carried by a `sync_board_state` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPayload {
    pub categories: Vec<CategoryPayload>,
    /// Cells that are no longer selectable. Missing means none.
    #[serde(rename = "disabledCells", default)]
    pub disabled_cells: Vec<DisabledCellPayload>,
}

/// A roster entry broadcast in `scores_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub name: String,
    pub score: u32,
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room. Sent exactly once, as the first frame on a transport.
    JoinRoom {
        /// Four-letter room code, upper case.
        code: String,
        /// Display name of the joining player.
        name: String,
        /// `data:image/jpeg;base64,...` URL, or `null` when no picture was chosen.
        picture: Option<String>,
    },
    /// Claim the current turn.
    Buzz { name: String },
}

/// Message types sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The server rejected the client; the message is shown verbatim.
    Error { message: String },
    /// The join was accepted.
    JoinSuccess,
    /// The host started the game.
    StartGame,
    /// Full board snapshot plus this player's score.
    SyncBoardState { board: BoardPayload, score: u32 },
    /// A single cell was chosen and is now disabled.
    BoardUpdate {
        #[serde(rename = "categoryIndex")]
        category_index: usize,
        #[serde(rename = "wordIndex")]
        word_index: usize,
    },
    /// The score table changed.
    ScoresUpdated { players: Vec<PlayerScore> },
    /// A new turn began and the buzzer is open.
    NextTurn,
    /// Somebody buzzed; the buzzer is closed for everyone.
    BuzzerLock,
    /// The game ended.
    GameOver {
        #[serde(rename = "winnerName")]
        winner_name: String,
    },
    /// The host left and the room no longer exists.
    RoomClosed,
    /// Any message kind this client does not understand.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Wire name of the message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::JoinSuccess => "join_success",
            Self::StartGame => "start_game",
            Self::SyncBoardState { .. } => "sync_board_state",
            Self::BoardUpdate { .. } => "board_update",
            Self::ScoresUpdated { .. } => "scores_updated",
            Self::NextTurn => "next_turn",
            Self::BuzzerLock => "buzzer_lock",
            Self::GameOver { .. } => "game_over",
            Self::RoomClosed => "room_closed",
            Self::Unknown => "unknown",
        }
    }
}
