//! Outbound intents: joining a room and buzzing in.
//!
//! Both intents check their preconditions locally. A join that fails
//! validation never reaches the network; a buzz that fails its check is
//! never sent.

use tracing::debug;

use crate::error::{BuzzerError, Result};
use crate::picture::EncodedPicture;
use crate::protocol::ClientMessage;
use crate::state::{GameSession, RoomCode, Session};

/// A validated request to join a room.
///
/// Constructing one is the only way to start a client, so a client can never
/// open a transport for an invalid join.
///
/// # Example
///
/// ```
/// use buzzer_client::JoinIntent;
///
/// let intent = JoinIntent::new("abcd", "Bob").unwrap();
/// assert_eq!(intent.room_code().as_str(), "ABCD");
/// assert!(JoinIntent::new("abc", "Bob").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinIntent {
    room_code: RoomCode,
    player_name: String,
    picture: Option<EncodedPicture>,
}

impl JoinIntent {
    /// Validate user input for a join.
    ///
    /// # Errors
    ///
    /// Returns [`BuzzerError::InvalidRoomCode`] unless `room_code` is four
    /// letters, and [`BuzzerError::EmptyPlayerName`] if `player_name` is blank.
    pub fn new(room_code: &str, player_name: &str) -> Result<Self> {
        let room_code = RoomCode::parse(room_code)?;
        let player_name = player_name.trim();
        if player_name.is_empty() {
            return Err(BuzzerError::EmptyPlayerName);
        }
        Ok(Self {
            room_code,
            player_name: player_name.to_string(),
            picture: None,
        })
    }

    /// Attach the (optional) profile picture.
    #[must_use]
    pub fn with_picture(mut self, picture: Option<EncodedPicture>) -> Self {
        self.picture = picture;
        self
    }

    /// Encode raw image bytes and attach the result. A missing or broken image
    /// leaves the intent without a picture.
    #[cfg(feature = "picture")]
    pub async fn with_picture_bytes(self, source: Option<Vec<u8>>, bound: u32) -> Self {
        let picture = crate::picture::encode_picture(source, bound).await;
        self.with_picture(picture)
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

    /// The wire message for this intent.
    pub(crate) fn to_message(&self) -> ClientMessage {
        ClientMessage::JoinRoom {
            code: self.room_code.as_str().to_string(),
            name: self.player_name.clone(),
            picture: self.picture.clone().map(EncodedPicture::into_data_url),
        }
    }

    /// A fresh session for this join attempt.
    pub fn to_session(&self) -> GameSession {
        GameSession::new(Session::new(
            self.room_code.clone(),
            self.player_name.clone(),
            self.picture.clone(),
        ))
    }
}

/// Build a buzz for `game` and engage the optimistic local lock.
///
/// The lock is released only when the server opens the next turn; a buzz the
/// server rejects stays locked until then.
///
/// # Errors
///
/// Returns [`BuzzerError::BuzzerNotOpen`] unless the session is connected, the
/// buzzer is open, and this player has not buzzed yet this turn.
pub fn buzz_intent(game: &mut GameSession) -> Result<ClientMessage> {
    if !game.buzzer_enabled() {
        debug!(turn = ?game.turn(), buzzed = game.has_buzzed(), "buzz suppressed");
        return Err(BuzzerError::BuzzerNotOpen);
    }
    game.buzzed = true;
    Ok(ClientMessage::Buzz {
        name: game.session().player_name().to_string(),
    })
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
    use crate::state::{ConnectionPhase, TurnPhase};

    fn connected_game() -> GameSession {
        let mut game = JoinIntent::new("ABCD", "Bob").unwrap().to_session();
        game.session.set_connection_phase(ConnectionPhase::Connected);
        game
    }

    #[test]
    fn join_intent_validates_before_anything_else() {
        assert!(matches!(
            JoinIntent::new("", "Bob"),
            Err(BuzzerError::InvalidRoomCode(_))
        ));
        assert!(matches!(
            JoinIntent::new("AB12", "Bob"),
            Err(BuzzerError::InvalidRoomCode(_))
        ));
        assert!(matches!(
            JoinIntent::new("ABCD", "   "),
            Err(BuzzerError::EmptyPlayerName)
        ));
    }

    #[test]
    fn join_message_carries_null_picture_when_absent() {
        let intent = JoinIntent::new("abcd", " Bob ").unwrap();
        let json = serde_json::to_value(intent.to_message()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "join_room",
                "code": "ABCD",
                "name": "Bob",
                "picture": null,
            })
        );
    }

    #[test]
    fn buzz_when_open_sends_name_and_locks() {
        let mut game = connected_game();
        game.turn = TurnPhase::BuzzerOpen;

        let msg = buzz_intent(&mut game).unwrap();
        assert_eq!(msg, ClientMessage::Buzz { name: "Bob".into() });
        assert!(game.has_buzzed());
        assert!(!game.buzzer_enabled());

        // A second press in the same turn is suppressed.
        assert!(matches!(
            buzz_intent(&mut game),
            Err(BuzzerError::BuzzerNotOpen)
        ));
    }

    #[test]
    fn buzz_is_refused_outside_an_open_turn() {
        for turn in [
            TurnPhase::AwaitingTurn,
            TurnPhase::BuzzerLocked,
            TurnPhase::GameOver,
        ] {
            let mut game = connected_game();
            game.turn = turn;
            assert!(matches!(
                buzz_intent(&mut game),
                Err(BuzzerError::BuzzerNotOpen)
            ));
            assert!(!game.has_buzzed());
        }
    }

    #[test]
    fn buzz_is_refused_while_not_connected() {
        let mut game = connected_game();
        game.turn = TurnPhase::BuzzerOpen;
        game.session.set_connection_phase(ConnectionPhase::Disconnected);
        assert!(matches!(
            buzz_intent(&mut game),
            Err(BuzzerError::BuzzerNotOpen)
        ));
    }
}
