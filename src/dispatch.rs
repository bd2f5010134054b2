//! Protocol dispatcher: decode server frames and apply them to the store.
//!
//! Every handler here is a pure function of `(ClientState, input)` that
//! returns the next state plus a list of [`Effect`]s for the transport loop
//! to carry out. Handlers never fail: malformed input is logged and leaves
//! the state untouched.

use tracing::{debug, info, warn};

use crate::board::{Board, CellAddress};
use crate::event::BuzzerEvent;
use crate::protocol::{BoardPayload, PlayerScore, ServerMessage};
use crate::state::{names_match, ClientState, ConnectionPhase, GameOutcome, GameSession, TurnPhase};

/// Notice shown after the transport dropped.
pub const CONNECTION_LOST_NOTICE: &str = "Connection lost. Please rejoin.";

/// Notice shown after the host closed the room.
pub const ROOM_CLOSED_NOTICE: &str = "The host disconnected. The room has been closed.";

/// Side effect requested by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Notify the view.
    Emit(BuzzerEvent),
    /// Close the transport; the session is over.
    CloseTransport,
}

/// Result of applying one input to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ClientState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: ClientState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    fn emit(game: GameSession, event: BuzzerEvent) -> Self {
        Self {
            state: ClientState::InGame(game),
            effects: vec![Effect::Emit(event)],
        }
    }

    /// Drop the session and go back to the join screen with `notice`.
    fn end_session(notice: String) -> Self {
        Self {
            state: ClientState::Joining {
                notice: Some(notice.clone()),
            },
            effects: vec![
                Effect::CloseTransport,
                Effect::Emit(BuzzerEvent::ReturnedToJoin { notice }),
            ],
        }
    }
}

// ── Decoding ────────────────────────────────────────────────────────

/// Decode one text frame.
///
/// The discriminator may be named `type` or `kind`. Frames that are not JSON
/// or lack a required field are logged and dropped (`None`); unrecognized
/// kinds decode to [`ServerMessage::Unknown`].
pub fn decode(text: &str) -> Option<ServerMessage> {
    let mut value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("dropping undecodable server frame: {e}, raw: {text}");
            return None;
        }
    };

    if let Some(object) = value.as_object_mut() {
        if !object.contains_key("type") {
            if let Some(kind) = object.remove("kind") {
                object.insert("type".to_string(), kind);
            }
        }
    }

    match serde_json::from_value::<ServerMessage>(value) {
        Ok(ServerMessage::Unknown) => {
            debug!("ignoring unknown server message kind, raw: {text}");
            Some(ServerMessage::Unknown)
        }
        Ok(message) => Some(message),
        Err(e) => {
            warn!("dropping malformed server message: {e}, raw: {text}");
            None
        }
    }
}

// ── Transport lifecycle ─────────────────────────────────────────────

/// The join intent went out on a freshly opened transport.
pub fn on_connected(state: ClientState) -> Transition {
    match state {
        ClientState::InGame(mut game) => {
            game.session.set_connection_phase(ConnectionPhase::Connected);
            Transition::emit(game, BuzzerEvent::Connected)
        }
        joining @ ClientState::Joining { .. } => Transition::stay(joining),
    }
}

/// The transport failed or closed without the session having ended.
pub fn on_transport_lost(state: ClientState, notice: &str) -> Transition {
    match state {
        ClientState::InGame(game) => {
            info!(room = %game.session.room_code(), "session lost with the connection");
            Transition {
                state: ClientState::Joining {
                    notice: Some(notice.to_string()),
                },
                effects: vec![Effect::Emit(BuzzerEvent::ReturnedToJoin {
                    notice: notice.to_string(),
                })],
            }
        }
        joining @ ClientState::Joining { .. } => Transition::stay(joining),
    }
}

/// A new transport is about to be opened for the same join intent.
///
/// All server-derived state is dropped; the next snapshot restores it.
pub fn on_reconnecting(state: ClientState, attempt: u32, delay: std::time::Duration) -> Transition {
    match state {
        ClientState::InGame(game) => {
            Transition::emit(game.reset(), BuzzerEvent::Reconnecting { attempt, delay })
        }
        joining @ ClientState::Joining { .. } => Transition::stay(joining),
    }
}

// ── Server messages ─────────────────────────────────────────────────

/// Apply one server message to the store.
pub fn dispatch(state: ClientState, message: ServerMessage) -> Transition {
    let game = match state {
        ClientState::InGame(game) => game,
        joining @ ClientState::Joining { .. } => {
            debug!(kind = message.kind(), "ignoring server message outside a session");
            return Transition::stay(joining);
        }
    };

    debug!(kind = message.kind(), "dispatching server message");
    match message {
        ServerMessage::Error { message } => {
            warn!("server error: {message}");
            Transition::end_session(message)
        }
        ServerMessage::JoinSuccess => Transition::emit(game, BuzzerEvent::Joined),
        ServerMessage::StartGame => Transition::emit(game, BuzzerEvent::GameStarted),
        ServerMessage::SyncBoardState { board, score } => sync_board_state(game, &board, score),
        ServerMessage::BoardUpdate {
            category_index,
            word_index,
        } => board_update(game, CellAddress::new(category_index, word_index)),
        ServerMessage::ScoresUpdated { players } => scores_updated(game, players),
        ServerMessage::NextTurn => {
            let mut game = game;
            game.turn = TurnPhase::BuzzerOpen;
            game.buzzed = false;
            Transition::emit(game, BuzzerEvent::BuzzerOpened)
        }
        ServerMessage::BuzzerLock => {
            let mut game = game;
            game.turn = TurnPhase::BuzzerLocked;
            Transition::emit(game, BuzzerEvent::BuzzerLocked)
        }
        ServerMessage::GameOver { winner_name } => game_over(game, winner_name),
        ServerMessage::RoomClosed => {
            info!(room = %game.session.room_code(), "room closed by host");
            Transition::end_session(ROOM_CLOSED_NOTICE.to_string())
        }
        ServerMessage::Unknown => Transition::stay(ClientState::InGame(game)),
    }
}

fn sync_board_state(mut game: GameSession, payload: &BoardPayload, score: u32) -> Transition {
    match Board::from_snapshot(payload) {
        Ok(board) => {
            debug!(
                categories = board.category_count(),
                words = board.words_per_category(),
                score,
                "board rebuilt from snapshot"
            );
            game.board = Some(board);
            game.score = score;
            Transition::emit(game, BuzzerEvent::BoardSynced { score })
        }
        Err(e) => {
            warn!("rejecting board snapshot: {e}");
            Transition::stay(ClientState::InGame(game))
        }
    }
}

fn board_update(mut game: GameSession, address: CellAddress) -> Transition {
    let Some(board) = game.board.as_mut() else {
        debug!(?address, "board update before any snapshot, ignoring");
        return Transition::stay(ClientState::InGame(game));
    };
    if board.disable(address) {
        return Transition::emit(game, BuzzerEvent::CellDisabled { address });
    }
    if board.word(address).is_none() {
        debug!(?address, "board update for a cell not on the board, ignoring");
    }
    Transition::stay(ClientState::InGame(game))
}

fn scores_updated(mut game: GameSession, players: Vec<PlayerScore>) -> Transition {
    let local = players
        .iter()
        .find(|p| names_match(&p.name, game.session.player_name()))
        .map(|p| p.score);
    if let Some(score) = local {
        game.score = score;
    }
    game.roster = players;
    Transition::emit(game, BuzzerEvent::ScoresUpdated { score: local })
}

fn game_over(mut game: GameSession, winner: String) -> Transition {
    let won = names_match(&winner, game.session.player_name());
    info!(winner = %winner, won, "game over");
    game.turn = TurnPhase::GameOver;
    game.outcome = Some(GameOutcome {
        winner: winner.clone(),
        won,
    });
    Transition::emit(game, BuzzerEvent::GameOver { winner, won })
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
    use crate::intent::JoinIntent;
    use crate::protocol::{CategoryPayload, DisabledCellPayload, WordPayload};

    fn joined(name: &str) -> ClientState {
        let game = JoinIntent::new("ABCD", name).unwrap().to_session();
        on_connected(ClientState::InGame(game)).state
    }

    fn snapshot(categories: usize, words: usize, disabled: &[(usize, usize)], score: u32) -> ServerMessage {
        ServerMessage::SyncBoardState {
            board: BoardPayload {
                categories: (0..categories)
                    .map(|c| CategoryPayload {
                        name: format!("C{c}"),
                        words: (0..words)
                            .map(|w| WordPayload {
                                point_value: (w as u32 + 1) * 200,
                            })
                            .collect(),
                    })
                    .collect(),
                disabled_cells: disabled
                    .iter()
                    .map(|&(category_index, word_index)| DisabledCellPayload {
                        category_index,
                        word_index,
                    })
                    .collect(),
            },
            score,
        }
    }

    fn apply(state: ClientState, messages: Vec<ServerMessage>) -> ClientState {
        messages
            .into_iter()
            .fold(state, |state, msg| dispatch(state, msg).state)
    }

    fn game(state: &ClientState) -> &GameSession {
        state.game().expect("expected an in-game state")
    }

    // ── decode ──────────────────────────────────────────────────────

    #[test]
    fn decode_accepts_type_discriminator() {
        let msg = decode(r#"{"type":"board_update","categoryIndex":1,"wordIndex":2}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::BoardUpdate {
                category_index: 1,
                word_index: 2
            }
        );
    }

    #[test]
    fn decode_accepts_kind_discriminator() {
        let msg = decode(r#"{"kind":"game_over","winnerName":"Alice"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::GameOver {
                winner_name: "Alice".into()
            }
        );
    }

    #[test]
    fn decode_maps_unknown_kind_to_unknown() {
        assert_eq!(
            decode(r#"{"type":"confetti","colors":3}"#),
            Some(ServerMessage::Unknown)
        );
    }

    #[test]
    fn decode_drops_garbage_and_shape_errors() {
        assert_eq!(decode("not json"), None);
        assert_eq!(decode(r#""just a string""#), None);
        assert_eq!(decode(r#"{"no":"discriminator"}"#), None);
        assert_eq!(decode(r#"{"type":"board_update","categoryIndex":1}"#), None);
        assert_eq!(decode(r#"{"type":"error"}"#), None);
    }

    // ── lifecycle ───────────────────────────────────────────────────

    #[test]
    fn connected_marks_session_connected() {
        let game = JoinIntent::new("ABCD", "Bob").unwrap().to_session();
        let t = on_connected(ClientState::InGame(game));
        assert_eq!(t.state.connection_phase(), ConnectionPhase::Connected);
        assert_eq!(t.effects, vec![Effect::Emit(BuzzerEvent::Connected)]);
    }

    #[test]
    fn transport_lost_returns_to_join_with_notice() {
        let state = apply(joined("Bob"), vec![ServerMessage::NextTurn]);
        let t = on_transport_lost(state, CONNECTION_LOST_NOTICE);
        assert_eq!(t.state.notice(), Some(CONNECTION_LOST_NOTICE));
        assert_eq!(t.state.connection_phase(), ConnectionPhase::Disconnected);
        assert!(!t.effects.contains(&Effect::CloseTransport));
    }

    #[test]
    fn reconnecting_resets_server_state_but_keeps_identity() {
        let state = apply(joined("Bob"), vec![snapshot(2, 2, &[(0, 0)], 400), ServerMessage::NextTurn]);
        let t = on_reconnecting(state, 1, std::time::Duration::from_millis(10));
        let g = game(&t.state);
        assert!(g.board().is_none());
        assert_eq!(g.score(), 0);
        assert_eq!(g.turn(), TurnPhase::AwaitingTurn);
        assert_eq!(g.session().player_name(), "Bob");
        assert_eq!(g.session().connection_phase(), ConnectionPhase::Connecting);
    }

    // ── snapshot ────────────────────────────────────────────────────

    #[test]
    fn snapshot_builds_board_and_score() {
        let t = dispatch(joined("Bob"), snapshot(2, 2, &[], 0));
        let g = game(&t.state);
        let board = g.board().unwrap();
        assert_eq!((board.category_count(), board.words_per_category()), (2, 2));
        assert_eq!(g.score(), 0);
        assert_eq!(t.effects, vec![Effect::Emit(BuzzerEvent::BoardSynced { score: 0 })]);
    }

    #[test]
    fn second_snapshot_replaces_first_without_carry_over() {
        let state = apply(
            joined("Bob"),
            vec![
                snapshot(3, 3, &[(0, 0), (2, 1)], 100),
                ServerMessage::BoardUpdate {
                    category_index: 1,
                    word_index: 2,
                },
                snapshot(2, 2, &[(1, 1)], 700),
            ],
        );
        let expected = apply(joined("Bob"), vec![snapshot(2, 2, &[(1, 1)], 700)]);
        assert_eq!(game(&state).board(), game(&expected).board());
        assert_eq!(
            game(&state).board().unwrap().disabled_cells(),
            vec![CellAddress::new(1, 1)]
        );
        assert_eq!(game(&state).score(), 700);
    }

    #[test]
    fn ragged_snapshot_leaves_state_unchanged() {
        let before = apply(joined("Bob"), vec![snapshot(2, 2, &[], 300)]);
        let mut ragged = snapshot(2, 2, &[], 900);
        if let ServerMessage::SyncBoardState { board, .. } = &mut ragged {
            board.categories[0].words.push(WordPayload { point_value: 100 });
        }
        let t = dispatch(before.clone(), ragged);
        assert_eq!(t.state, before);
        assert!(t.effects.is_empty());
    }

    // ── incremental update ──────────────────────────────────────────

    #[test]
    fn board_update_is_idempotent() {
        let update = || ServerMessage::BoardUpdate {
            category_index: 0,
            word_index: 1,
        };
        let once = apply(joined("Bob"), vec![snapshot(2, 2, &[], 0), update()]);
        let t = dispatch(once.clone(), update());
        assert_eq!(t.state, once);
        assert!(t.effects.is_empty(), "duplicate update emits nothing");
    }

    #[test]
    fn board_update_touches_only_its_cell() {
        let before = apply(joined("Bob"), vec![snapshot(2, 2, &[], 500), ServerMessage::NextTurn]);
        let t = dispatch(
            before.clone(),
            ServerMessage::BoardUpdate {
                category_index: 1,
                word_index: 0,
            },
        );
        let (b, a) = (game(&before), game(&t.state));
        assert_eq!(a.board().unwrap().disabled_cells(), vec![CellAddress::new(1, 0)]);
        assert_eq!(a.score(), b.score());
        assert_eq!(a.turn(), b.turn());
        assert_eq!(
            t.effects,
            vec![Effect::Emit(BuzzerEvent::CellDisabled {
                address: CellAddress::new(1, 0)
            })]
        );
    }

    #[test]
    fn board_update_before_snapshot_or_out_of_range_is_ignored() {
        let state = joined("Bob");
        let t = dispatch(
            state.clone(),
            ServerMessage::BoardUpdate {
                category_index: 0,
                word_index: 0,
            },
        );
        assert_eq!(t.state, state);

        let state = apply(joined("Bob"), vec![snapshot(2, 2, &[], 0)]);
        let t = dispatch(
            state.clone(),
            ServerMessage::BoardUpdate {
                category_index: 7,
                word_index: 0,
            },
        );
        assert_eq!(t.state, state);
        assert!(t.effects.is_empty());
    }

    // ── scores ──────────────────────────────────────────────────────

    #[test]
    fn scores_match_local_player_case_insensitively() {
        for joined_as in ["alice", "ALICE", "Alice"] {
            let t = dispatch(
                joined(joined_as),
                ServerMessage::ScoresUpdated {
                    players: vec![
                        PlayerScore {
                            name: "Bob".into(),
                            score: 10,
                        },
                        PlayerScore {
                            name: "Alice".into(),
                            score: 40,
                        },
                    ],
                },
            );
            assert_eq!(game(&t.state).score(), 40, "joined as {joined_as}");
            assert_eq!(game(&t.state).roster().len(), 2);
            assert_eq!(
                t.effects,
                vec![Effect::Emit(BuzzerEvent::ScoresUpdated { score: Some(40) })]
            );
        }
    }

    #[test]
    fn scores_without_local_player_keep_local_score() {
        let state = apply(joined("Carol"), vec![snapshot(1, 1, &[], 200)]);
        let t = dispatch(
            state,
            ServerMessage::ScoresUpdated {
                players: vec![PlayerScore {
                    name: "Dave".into(),
                    score: 999,
                }],
            },
        );
        assert_eq!(game(&t.state).score(), 200);
    }

    // ── turns ───────────────────────────────────────────────────────

    #[test]
    fn next_turn_opens_buzzer_and_clears_local_lock() {
        let mut state = apply(joined("Bob"), vec![ServerMessage::NextTurn]);
        crate::intent::buzz_intent(state.game_mut().unwrap()).unwrap();
        assert!(!game(&state).buzzer_enabled());

        let state = apply(state, vec![ServerMessage::BuzzerLock, ServerMessage::NextTurn]);
        assert_eq!(game(&state).turn(), TurnPhase::BuzzerOpen);
        assert!(game(&state).buzzer_enabled());
    }

    #[test]
    fn buzzer_lock_disables_buzzer() {
        let state = apply(joined("Bob"), vec![ServerMessage::NextTurn, ServerMessage::BuzzerLock]);
        assert_eq!(game(&state).turn(), TurnPhase::BuzzerLocked);
        assert!(!game(&state).buzzer_enabled());
    }

    #[test]
    fn game_over_compares_winner_case_insensitively() {
        let t = dispatch(
            joined("bob"),
            ServerMessage::GameOver {
                winner_name: "BOB".into(),
            },
        );
        assert_eq!(game(&t.state).turn(), TurnPhase::GameOver);
        assert!(game(&t.state).outcome().unwrap().won);

        let t = dispatch(
            joined("bob"),
            ServerMessage::GameOver {
                winner_name: "Alice".into(),
            },
        );
        assert_eq!(
            t.effects,
            vec![Effect::Emit(BuzzerEvent::GameOver {
                winner: "Alice".into(),
                won: false
            })]
        );
    }

    // ── session end ─────────────────────────────────────────────────

    #[test]
    fn room_closed_resets_from_any_phase() {
        let phases = vec![
            vec![],
            vec![snapshot(2, 2, &[], 100)],
            vec![ServerMessage::NextTurn],
            vec![ServerMessage::NextTurn, ServerMessage::BuzzerLock],
            vec![ServerMessage::GameOver {
                winner_name: "x".into(),
            }],
        ];
        for prefix in phases {
            let state = apply(joined("Bob"), prefix);
            let t = dispatch(state, ServerMessage::RoomClosed);
            assert_eq!(
                t.state,
                ClientState::Joining {
                    notice: Some(ROOM_CLOSED_NOTICE.into())
                }
            );
            assert!(t.effects.contains(&Effect::CloseTransport));
        }
    }

    #[test]
    fn server_error_is_surfaced_verbatim_and_closes() {
        let t = dispatch(
            joined("Bob"),
            ServerMessage::Error {
                message: "Room not found".into(),
            },
        );
        assert_eq!(t.state.notice(), Some("Room not found"));
        assert_eq!(
            t.effects,
            vec![
                Effect::CloseTransport,
                Effect::Emit(BuzzerEvent::ReturnedToJoin {
                    notice: "Room not found".into()
                })
            ]
        );
    }

    #[test]
    fn messages_outside_a_session_are_ignored() {
        let state = ClientState::Joining {
            notice: Some("bye".into()),
        };
        let t = dispatch(state.clone(), ServerMessage::NextTurn);
        assert_eq!(t.state, state);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn unknown_messages_change_nothing() {
        let state = apply(joined("Bob"), vec![snapshot(1, 2, &[], 5)]);
        let t = dispatch(state.clone(), ServerMessage::Unknown);
        assert_eq!(t.state, state);
        assert!(t.effects.is_empty());
    }
}
