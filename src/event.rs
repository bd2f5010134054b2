//! Events delivered to the view layer.
//!
//! Each event is a change notification: the view re-reads whatever it needs
//! from the store (see [`BuzzerClient::state`](crate::BuzzerClient::state))
//! and repaints. Payloads carry only the part that changed.

use std::time::Duration;

use crate::board::CellAddress;

/// Events emitted by a running [`BuzzerClient`](crate::BuzzerClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuzzerEvent {
    /// The transport is open and the join intent was sent.
    Connected,
    /// The server accepted the join.
    Joined,
    /// The host started the game.
    GameStarted,
    /// The board was rebuilt from a full snapshot.
    BoardSynced {
        /// This player's score as carried by the snapshot.
        score: u32,
    },
    /// A single cell was disabled.
    CellDisabled { address: CellAddress },
    /// The score table changed.
    ScoresUpdated {
        /// This player's score, if the roster mentioned them.
        score: Option<u32>,
    },
    /// A new turn opened the buzzer.
    BuzzerOpened,
    /// The buzzer closed for everyone.
    BuzzerLocked,
    /// The game ended.
    GameOver {
        /// Winner's name as sent by the server.
        winner: String,
        /// Whether the winner is this player.
        won: bool,
    },
    /// The session ended and the client is back at the join screen.
    ReturnedToJoin {
        /// User-facing explanation.
        notice: String,
    },
    /// The connection was lost and a new one will be attempted after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The transport loop exited. Always the last event.
    Disconnected { reason: Option<String> },
}
