//! Error types for the buzzer client.

use thiserror::Error;

/// Errors that can occur when using the buzzer client.
#[derive(Debug, Error)]
pub enum BuzzerError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// The room code is not exactly four letters.
    #[error("please enter a 4-letter room code (got {0:?})")]
    InvalidRoomCode(String),

    /// The player name is empty or only whitespace.
    #[error("please enter your name")]
    EmptyPlayerName,

    /// A buzz was attempted while the buzzer is not open for this player.
    #[error("the buzzer is not open")]
    BuzzerNotOpen,

    /// A board snapshot had categories of different lengths.
    #[error("ragged board: category {category} has {found} words, expected {expected}")]
    RaggedBoard {
        /// Index of the first category whose length differs from the first one.
        category: usize,
        /// Word count of the first category.
        expected: usize,
        /// Word count of the offending category.
        found: usize,
    },

    /// A board snapshot contained a word worth zero points.
    #[error("word {word} of category {category} has no point value")]
    ZeroPointWord {
        /// Category index of the word.
        category: usize,
        /// Word index within the category.
        word: usize,
    },

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for buzzer client operations.
pub type Result<T> = std::result::Result<T, BuzzerError>;
