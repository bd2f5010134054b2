//! # Buzzer Client
//!
//! Async Rust client for a multiplayer trivia buzzer game.
//!
//! A player joins a four-letter room with a display name and an optional
//! profile picture. The server then drives the game: it pushes the board of
//! categories and point values, the shared score roster, turn changes, buzzer
//! locks and the final winner. The only thing a player sends after joining is
//! a buzz.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement the [`Transport`] trait for any backend
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   [`WebSocketTransport`] and [`WebSocketConnector`]
//! - **Event-driven**: receive typed [`BuzzerEvent`]s via a channel
//! - **Pure handlers**: every server message is applied by a plain function in
//!   [`dispatch`], so game logic is testable without a runtime
//! - **Profile pictures**: the default `picture` feature downscales and
//!   JPEG-encodes an image into a data URL before joining
//! - **Optional reconnect**: plug in a [`ReconnectPolicy`] such as
//!   [`ExponentialBackoff`](reconnect::ExponentialBackoff)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), buzzer_client::BuzzerError> {
//! use buzzer_client::{BuzzerClient, BuzzerConfig, BuzzerEvent, JoinIntent, WebSocketConnector};
//!
//! let intent = JoinIntent::new("ABCD", "Bob")?;
//! let connector = WebSocketConnector::new("ws://localhost:3000");
//! let (mut client, mut events) =
//!     BuzzerClient::connect(connector, intent, BuzzerConfig::new()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         BuzzerEvent::BuzzerOpened => client.buzz().await?,
//!         BuzzerEvent::GameOver { winner, won } => {
//!             println!("{winner} wins (you won: {won})");
//!             client.shutdown().await;
//!         }
//!         BuzzerEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod intent;
pub mod picture;
pub mod protocol;
pub mod reconnect;
pub mod state;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use board::{Board, CellAddress};
pub use client::{BuzzerClient, BuzzerConfig};
pub use error::BuzzerError;
pub use event::BuzzerEvent;
pub use intent::JoinIntent;
pub use picture::EncodedPicture;
pub use protocol::{ClientMessage, ServerMessage};
pub use reconnect::ReconnectPolicy;
pub use state::{ClientState, ConnectionPhase, GameSession, TurnPhase};
pub use transport::{Connector, Transport};

#[cfg(feature = "picture")]
pub use picture::{encode_picture, encode_picture_file};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
