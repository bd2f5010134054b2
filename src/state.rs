//! Game state store: everything the client knows about the current session.
//!
//! The store holds no local source of truth. Every field below the
//! [`Session`] identity is a mirror of something the server said, and is
//! replaced or mutated only by the dispatcher.

use std::fmt;

use crate::board::Board;
use crate::error::{BuzzerError, Result};
use crate::picture::EncodedPicture;
use crate::protocol::PlayerScore;

/// Case-insensitive player name comparison used for roster and winner matching.
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

// ── Identity ────────────────────────────────────────────────────────

/// A validated four-letter room code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Length of every room code issued by the server.
    pub const LEN: usize = 4;

    /// Parse user input into a room code.
    ///
    /// Surrounding whitespace is trimmed and letters are upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`BuzzerError::InvalidRoomCode`] unless the input is exactly
    /// four ASCII letters.
    pub fn parse(input: &str) -> Result<Self> {
        let code = input.trim().to_ascii_uppercase();
        if code.len() != Self::LEN || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(BuzzerError::InvalidRoomCode(input.to_string()));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport lifecycle as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// Transport is opening, or the join intent has not been sent yet.
    #[default]
    Connecting,
    /// The join intent went out on an open transport.
    Connected,
    /// The transport closed or failed.
    Disconnected,
}

/// Who the player is and how they are connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    room_code: RoomCode,
    player_name: String,
    picture: Option<EncodedPicture>,
    connection_phase: ConnectionPhase,
}

impl Session {
    pub(crate) fn new(
        room_code: RoomCode,
        player_name: String,
        picture: Option<EncodedPicture>,
    ) -> Self {
        Self {
            room_code,
            player_name,
            picture,
            connection_phase: ConnectionPhase::Connecting,
        }
    }

    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn picture(&self) -> Option<&EncodedPicture> {
        self.picture.as_ref()
    }

    pub fn connection_phase(&self) -> ConnectionPhase {
        self.connection_phase
    }

    pub(crate) fn set_connection_phase(&mut self, phase: ConnectionPhase) {
        self.connection_phase = phase;
    }
}

// ── Game ────────────────────────────────────────────────────────────

/// Global buzz availability, broadcast by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    /// Waiting for the host to open a turn.
    #[default]
    AwaitingTurn,
    /// Players may buzz.
    BuzzerOpen,
    /// Someone buzzed; nobody else may.
    BuzzerLocked,
    /// The game has ended.
    GameOver,
}

/// Final result announced by `game_over`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    /// Winner's name as sent by the server.
    pub winner: String,
    /// Whether the winner is this player.
    pub won: bool,
}

/// Aggregate root for one joined session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub(crate) session: Session,
    pub(crate) board: Option<Board>,
    pub(crate) roster: Vec<PlayerScore>,
    pub(crate) score: u32,
    pub(crate) turn: TurnPhase,
    pub(crate) buzzed: bool,
    pub(crate) outcome: Option<GameOutcome>,
}

impl GameSession {
    /// An empty session awaiting its first snapshot.
    pub fn new(session: Session) -> Self {
        Self {
            session,
            board: None,
            roster: Vec::new(),
            score: 0,
            turn: TurnPhase::AwaitingTurn,
            buzzed: false,
            outcome: None,
        }
    }

    /// Same identity, all server-derived state dropped, phase back to
    /// [`ConnectionPhase::Connecting`].
    pub(crate) fn reset(self) -> Self {
        let mut session = self.session;
        session.set_connection_phase(ConnectionPhase::Connecting);
        Self::new(session)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The last board snapshot, with incremental updates applied.
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// The last broadcast score table.
    pub fn roster(&self) -> &[PlayerScore] {
        &self.roster
    }

    /// This player's score.
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn turn(&self) -> TurnPhase {
        self.turn
    }

    /// Whether this player buzzed during the current turn.
    pub fn has_buzzed(&self) -> bool {
        self.buzzed
    }

    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    /// Whether the buzz affordance should be enabled.
    pub fn buzzer_enabled(&self) -> bool {
        self.session.connection_phase == ConnectionPhase::Connected
            && self.turn == TurnPhase::BuzzerOpen
            && !self.buzzed
    }
}

/// Top-level client state: on the join screen, or inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Not in a room. `notice` explains the last return here, if any.
    Joining { notice: Option<String> },
    /// Joined (or joining) a room.
    InGame(GameSession),
}

impl Default for ClientState {
    fn default() -> Self {
        Self::Joining { notice: None }
    }
}

impl ClientState {
    pub fn game(&self) -> Option<&GameSession> {
        match self {
            Self::InGame(game) => Some(game),
            Self::Joining { .. } => None,
        }
    }

    pub fn game_mut(&mut self) -> Option<&mut GameSession> {
        match self {
            Self::InGame(game) => Some(game),
            Self::Joining { .. } => None,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            Self::Joining { notice } => notice.as_deref(),
            Self::InGame(_) => None,
        }
    }

    /// Connection phase of the live session, or `Disconnected` on the join screen.
    pub fn connection_phase(&self) -> ConnectionPhase {
        self.game()
            .map_or(ConnectionPhase::Disconnected, |g| g.session.connection_phase)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn room_code_is_trimmed_and_uppercased() {
        let code = RoomCode::parse("  abCd ").unwrap();
        assert_eq!(code.as_str(), "ABCD");
        assert_eq!(code.to_string(), "ABCD");
    }

    #[test]
    fn room_code_rejects_wrong_length_and_non_letters() {
        for bad in ["", "ABC", "ABCDE", "AB1D", "AB D", "ÄBCD"] {
            assert!(
                matches!(RoomCode::parse(bad), Err(BuzzerError::InvalidRoomCode(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn names_match_ignores_case() {
        assert!(names_match("Alice", "alice"));
        assert!(names_match("Alice", "ALICE"));
        assert!(!names_match("Alice", "Alicia"));
    }

    #[test]
    fn buzzer_enabled_requires_connection_open_turn_and_no_prior_buzz() {
        let session = Session::new(RoomCode::parse("ABCD").unwrap(), "Bob".into(), None);
        let mut game = GameSession::new(session);
        game.turn = TurnPhase::BuzzerOpen;
        assert!(!game.buzzer_enabled(), "still connecting");

        game.session.set_connection_phase(ConnectionPhase::Connected);
        assert!(game.buzzer_enabled());

        game.buzzed = true;
        assert!(!game.buzzer_enabled());

        game.buzzed = false;
        game.turn = TurnPhase::BuzzerLocked;
        assert!(!game.buzzer_enabled());
    }

    #[test]
    fn reset_keeps_identity_and_drops_server_state() {
        let session = Session::new(RoomCode::parse("WXYZ").unwrap(), "Eve".into(), None);
        let mut game = GameSession::new(session);
        game.session.set_connection_phase(ConnectionPhase::Connected);
        game.score = 300;
        game.turn = TurnPhase::BuzzerOpen;
        game.buzzed = true;

        let game = game.reset();
        assert_eq!(game.session().room_code().as_str(), "WXYZ");
        assert_eq!(game.session().player_name(), "Eve");
        assert_eq!(game.session().connection_phase(), ConnectionPhase::Connecting);
        assert_eq!(game.score(), 0);
        assert_eq!(game.turn(), TurnPhase::AwaitingTurn);
        assert!(!game.has_buzzed());
        assert!(game.board().is_none());
    }

    #[test]
    fn joining_state_reports_disconnected() {
        let state = ClientState::default();
        assert_eq!(state.connection_phase(), ConnectionPhase::Disconnected);
        assert!(state.game().is_none());
        assert_eq!(state.notice(), None);
    }
}
