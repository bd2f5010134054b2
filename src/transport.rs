//! The seam between the game client and the network.
//!
//! A [`Transport`] moves whole JSON text frames in both directions; how they
//! are framed on the wire is the transport's business. A [`Connector`] opens
//! fresh transports on demand.
//!
//! Pass an open transport to `BuzzerClient::start` when the caller owns
//! connection setup. Pass a connector to `BuzzerClient::connect` when the
//! client should open it, and open it again under a reconnect policy.
//!
//! # Plugging in another backend
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use buzzer_client::error::BuzzerError;
//! use buzzer_client::transport::Transport;
//!
//! struct QuicTransport { /* stream handles */ }
//!
//! #[async_trait]
//! impl Transport for QuicTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), BuzzerError> {
//!         // write one frame
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, BuzzerError>> {
//!         // next frame, or None once the peer has closed
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), BuzzerError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::BuzzerError;

/// Moves JSON text frames between client and server.
///
/// One `send` is one frame; one `recv` yields one frame, in server order.
///
/// # Cancel Safety
///
/// The client loop polls [`recv`](Transport::recv) inside `tokio::select!`,
/// so a `recv` future dropped before it resolves must not swallow a frame.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write one frame.
    ///
    /// # Errors
    ///
    /// Returns [`BuzzerError::TransportSend`] when the frame cannot be written,
    /// or [`BuzzerError::TransportClosed`] after [`close`](Transport::close).
    async fn send(&mut self, message: String) -> Result<(), BuzzerError>;

    /// Wait for the next frame.
    ///
    /// - `Some(Ok(text))`: one frame
    /// - `Some(Err(e))`: the connection failed
    /// - `None`: the server closed the connection
    async fn recv(&mut self) -> Option<Result<String, BuzzerError>>;

    /// Close the connection. Calling it twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails; resources are released
    /// regardless.
    async fn close(&mut self) -> Result<(), BuzzerError>;
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn send(&mut self, message: String) -> Result<(), BuzzerError> {
        (**self).send(message).await
    }

    async fn recv(&mut self) -> Option<Result<String, BuzzerError>> {
        (**self).recv().await
    }

    async fn close(&mut self) -> Result<(), BuzzerError> {
        (**self).close().await
    }
}

/// Opens new transports to one server.
///
/// Each call returns a brand-new, already-open transport. The client calls it
/// once per join attempt, and again for each reconnect attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    async fn connect(&self) -> Result<Box<dyn Transport>, BuzzerError>;
}
