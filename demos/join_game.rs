//! # Join Game Demo
//!
//! Joins a buzzer room from the terminal:
//!
//! 1. Encode an optional profile picture
//! 2. Connect to the game server via WebSocket
//! 3. Print board, score and turn changes as the server pushes them
//! 4. Press Enter to buzz while the buzzer is open
//! 5. Shut down gracefully on Ctrl+C, game over, or disconnect
//!
//! ## Running
//!
//! ```sh
//! BUZZER_ROOM=ABCD BUZZER_NAME=Ann cargo run --example join_game
//!
//! # Override the server URL and attach a picture:
//! BUZZER_URL=ws://my-server:3000 BUZZER_PICTURE=me.png \
//!     BUZZER_ROOM=ABCD BUZZER_NAME=Ann cargo run --example join_game
//! ```

use buzzer_client::picture::DEFAULT_PICTURE_BOUND;
use buzzer_client::reconnect::ExponentialBackoff;
use buzzer_client::{
    encode_picture_file, BuzzerClient, BuzzerConfig, BuzzerError, BuzzerEvent, JoinIntent,
    WebSocketConnector,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default server URL when `BUZZER_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("BUZZER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let room = std::env::var("BUZZER_ROOM")?;
    let name = std::env::var("BUZZER_NAME")?;

    let picture = match std::env::var("BUZZER_PICTURE") {
        Ok(path) => {
            let picture = encode_picture_file(&path, DEFAULT_PICTURE_BOUND).await;
            if picture.is_none() {
                tracing::warn!("Could not use {path} as a picture, joining without one");
            }
            picture
        }
        Err(_) => None,
    };

    // Validation happens before anything touches the network.
    let intent = JoinIntent::new(&room, &name)?.with_picture(picture);

    // ── Connect ─────────────────────────────────────────────────────
    tracing::info!("Joining room {} at {url}", intent.room_code());
    let connector = WebSocketConnector::new(url).with_timeout(Duration::from_secs(10));
    let config = BuzzerConfig::new().with_reconnect(ExponentialBackoff::default());
    let (mut client, mut event_rx) = BuzzerClient::connect(connector, intent, config).await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            // Branch 1: store change pushed by the server (or transport layer).
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    BuzzerEvent::Joined => tracing::info!("Joined, waiting for the host"),
                    BuzzerEvent::GameStarted => tracing::info!("Game started!"),

                    BuzzerEvent::BoardSynced { score } => {
                        let state = client.state().await;
                        if let Some(board) = state.game().and_then(|g| g.board()) {
                            for category in board.categories() {
                                let points: Vec<String> = category
                                    .words()
                                    .iter()
                                    .map(|w| {
                                        if w.is_disabled() {
                                            "---".to_string()
                                        } else {
                                            w.points().to_string()
                                        }
                                    })
                                    .collect();
                                tracing::info!("{:>16}: {}", category.name(), points.join(" "));
                            }
                        }
                        tracing::info!("Your score: {score}");
                    }

                    BuzzerEvent::CellDisabled { address } => {
                        tracing::info!(
                            "Cell taken: category {} word {}",
                            address.category,
                            address.word
                        );
                    }

                    BuzzerEvent::ScoresUpdated { score } => {
                        let state = client.state().await;
                        if let Some(game) = state.game() {
                            for player in game.roster() {
                                tracing::info!("{:>16}: {}", player.name, player.score);
                            }
                        }
                        if let Some(score) = score {
                            tracing::info!("Your score: {score}");
                        }
                    }

                    BuzzerEvent::BuzzerOpened => tracing::info!("Buzzer open! Press Enter to buzz"),
                    BuzzerEvent::BuzzerLocked => tracing::info!("Buzzer locked"),

                    BuzzerEvent::GameOver { winner, won } => {
                        if won {
                            tracing::info!("You win!");
                        } else {
                            tracing::info!("{winner} wins");
                        }
                        break;
                    }

                    BuzzerEvent::ReturnedToJoin { notice } => {
                        tracing::warn!("{notice}");
                    }

                    BuzzerEvent::Reconnecting { attempt, delay } => {
                        tracing::warn!("Connection lost, retry #{attempt} in {delay:?}");
                    }

                    BuzzerEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        break;
                    }

                    other => tracing::debug!("Event: {other:?}"),
                }
            }

            // Branch 2: Enter pressed.
            line = stdin.next_line(), if stdin_open => {
                if !matches!(line, Ok(Some(_))) {
                    stdin_open = false;
                    continue;
                }
                match client.buzz().await {
                    Ok(()) => tracing::info!("Buzzed!"),
                    Err(BuzzerError::BuzzerNotOpen) => tracing::info!("The buzzer is not open"),
                    Err(e) => tracing::warn!("Buzz failed: {e}"),
                }
            }

            // Branch 3: Ctrl+C.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    Ok(())
}
