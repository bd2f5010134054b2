//! Async client for the buzzer game.
//!
//! [`BuzzerClient`] is a thin handle over a background transport loop. The
//! loop owns the transport: it sends the join intent as the first frame,
//! decodes every server frame, applies it to the shared store through the
//! pure handlers in [`dispatch`](crate::dispatch), and emits a
//! [`BuzzerEvent`] for each change on a bounded channel returned from
//! [`BuzzerClient::start`] / [`BuzzerClient::connect`].
//!
//! # Example
//!
//! ```rust,ignore
//! let intent = JoinIntent::new("ABCD", "Bob")?;
//! let connector = WebSocketConnector::new("wss://buzzer.example.com");
//! let (client, mut events) = BuzzerClient::connect(connector, intent, BuzzerConfig::new()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         BuzzerEvent::BuzzerOpened => client.buzz().await?,
//!         BuzzerEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn, Instrument};

use crate::dispatch::{self, Effect, Transition, CONNECTION_LOST_NOTICE};
use crate::error::{BuzzerError, Result};
use crate::event::BuzzerEvent;
use crate::intent::{buzz_intent, JoinIntent};
use crate::protocol::ClientMessage;
use crate::reconnect::{NoReconnect, ReconnectPolicy};
use crate::state::{ClientState, ConnectionPhase};
use crate::transport::{Connector, Transport};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `shutdown` waits before aborting the loop.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`BuzzerClient`].
///
/// # Example
///
/// ```
/// use buzzer_client::client::BuzzerConfig;
/// use buzzer_client::reconnect::ExponentialBackoff;
/// use std::time::Duration;
///
/// let config = BuzzerConfig::new()
///     .with_event_channel_capacity(64)
///     .with_shutdown_timeout(Duration::from_secs(2))
///     .with_reconnect(ExponentialBackoff::default());
/// assert_eq!(config.event_channel_capacity, 64);
/// ```
#[derive(Debug, Clone)]
pub struct BuzzerConfig {
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped (with a warning
    /// logged) rather than stalling the transport loop. The final
    /// `Disconnected` event is always delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`BuzzerClient::shutdown`] waits for the loop to close the
    /// transport before aborting it.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// What to do when the connection drops. Only used by
    /// [`BuzzerClient::connect`], which knows how to open new transports.
    ///
    /// Defaults to [`NoReconnect`].
    pub reconnect: Arc<dyn ReconnectPolicy>,
}

impl BuzzerConfig {
    pub fn new() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            reconnect: Arc::new(NoReconnect),
        }
    }

    /// Set the capacity of the bounded event channel (clamped to at least 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set how long `shutdown` waits before aborting the loop.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the reconnect strategy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.reconnect = Arc::new(policy);
        self
    }
}

impl Default for BuzzerConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the client handle and the transport loop.
struct Shared {
    connected: AtomicBool,
    state: Mutex<ClientState>,
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to one join attempt.
///
/// Dropping the handle aborts the transport loop; call
/// [`shutdown`](Self::shutdown) to close the transport gracefully. A rejoin
/// is a new handle.
pub struct BuzzerClient {
    /// Outbound intents for the transport loop.
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    shared: Arc<Shared>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl BuzzerClient {
    /// Start a session over an already-open transport.
    ///
    /// The join intent is the first frame sent. Without a connector the
    /// client cannot reconnect, so a lost transport always ends the session.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        intent: JoinIntent,
        config: BuzzerConfig,
    ) -> (Self, mpsc::Receiver<BuzzerEvent>) {
        Self::spawn(Box::new(transport), None, intent, config)
    }

    /// Open a transport through `connector` and start a session on it.
    ///
    /// The connector is kept for reconnects according to
    /// [`BuzzerConfig::reconnect`].
    ///
    /// # Errors
    ///
    /// Returns whatever the connector returns if the first transport cannot
    /// be opened. No session is created in that case.
    pub async fn connect(
        connector: impl Connector,
        intent: JoinIntent,
        config: BuzzerConfig,
    ) -> Result<(Self, mpsc::Receiver<BuzzerEvent>)> {
        let transport = connector.connect().await?;
        let connector: Arc<dyn Connector> = Arc::new(connector);
        Ok(Self::spawn(transport, Some(connector), intent, config))
    }

    fn spawn(
        transport: Box<dyn Transport>,
        connector: Option<Arc<dyn Connector>>,
        intent: JoinIntent,
        config: BuzzerConfig,
    ) -> (Self, mpsc::Receiver<BuzzerEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<BuzzerEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            state: Mutex::new(ClientState::InGame(intent.to_session())),
        });

        let span = tracing::info_span!(
            "buzzer_session",
            attempt_id = %uuid::Uuid::new_v4(),
            room = %intent.room_code(),
        );
        let ctx = LoopContext {
            connector,
            policy: config.reconnect,
            intent,
            cmd_rx,
            event_tx,
            shared: Arc::clone(&shared),
            shutdown_rx,
        };
        let task = tokio::spawn(transport_loop(transport, ctx).instrument(span));

        let client = Self {
            cmd_tx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Buzz in for the current turn.
    ///
    /// The local buzzer locks immediately; it reopens only on the server's
    /// next turn, whether or not the server accepted this buzz.
    ///
    /// # Errors
    ///
    /// Returns [`BuzzerError::NotConnected`] if the session is over, and
    /// [`BuzzerError::BuzzerNotOpen`] if the buzzer is closed or this player
    /// already buzzed this turn. Nothing is sent in either case.
    pub async fn buzz(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(BuzzerError::NotConnected);
        }
        let mut state = self.shared.state.lock().await;
        let game = state.game_mut().ok_or(BuzzerError::NotConnected)?;
        let msg = buzz_intent(game)?;
        self.cmd_tx
            .send(msg)
            .map_err(|_| BuzzerError::NotConnected)
    }

    /// Close the transport and stop the loop, waiting at most `shutdown_timeout`.
    ///
    /// Any live session is discarded. After this the event receiver yields
    /// `None` once the transport loop exits.
    pub async fn shutdown(&mut self) {
        debug!("BuzzerClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.connected.store(false, Ordering::Release);
        let mut state = self.shared.state.lock().await;
        if state.game().is_some() {
            *state = ClientState::default();
        }
    }

    // ── Read API ────────────────────────────────────────────────────

    /// Returns `true` while a transport is open and the join intent has been sent.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// A snapshot of the whole store.
    pub async fn state(&self) -> ClientState {
        self.shared.state.lock().await.clone()
    }

    /// Whether the buzz affordance should be enabled right now.
    pub async fn can_buzz(&self) -> bool {
        self.shared
            .state
            .lock()
            .await
            .game()
            .is_some_and(|g| g.buzzer_enabled())
    }

    pub async fn connection_phase(&self) -> ConnectionPhase {
        self.shared.state.lock().await.connection_phase()
    }
}

impl std::fmt::Debug for BuzzerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuzzerClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for BuzzerClient {
    fn drop(&mut self) {
        // No executor here to drive a graceful close, so just abort.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Everything the transport loop owns besides the transport itself.
struct LoopContext {
    connector: Option<Arc<dyn Connector>>,
    policy: Arc<dyn ReconnectPolicy>,
    intent: JoinIntent,
    cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<BuzzerEvent>,
    shared: Arc<Shared>,
    shutdown_rx: oneshot::Receiver<()>,
}

/// Why a single connection stopped.
enum Exit {
    /// The handle asked to stop, or was dropped.
    Shutdown,
    /// The server ended the session; the transport is already closed.
    Ended(Option<String>),
    /// The transport failed or closed on its own.
    Lost(Option<String>),
}

/// Outcome of trying to replace a lost transport.
enum Reopen {
    Opened(Box<dyn Transport>),
    GaveUp,
    Shutdown,
}

/// Drives one join attempt across however many transports the reconnect
/// policy allows, then emits the final `Disconnected` event.
async fn transport_loop(mut transport: Box<dyn Transport>, mut ctx: LoopContext) {
    debug!("transport loop started");
    let mut attempt = 0u32;

    let reason = loop {
        let (exit, heard_from_server) = run_connection(transport.as_mut(), &mut ctx).await;
        ctx.shared.connected.store(false, Ordering::Release);
        if heard_from_server {
            attempt = 0;
        }

        match exit {
            Exit::Shutdown => {
                let _ = transport.close().await;
                *ctx.shared.state.lock().await = ClientState::default();
                break Some("client shut down".to_string());
            }
            Exit::Ended(reason) => break reason,
            Exit::Lost(reason) => match reopen(&mut ctx, &mut attempt).await {
                Reopen::Opened(next) => transport = next,
                Reopen::GaveUp => {
                    apply(&ctx, |s| dispatch::on_transport_lost(s, CONNECTION_LOST_NOTICE)).await;
                    break reason;
                }
                Reopen::Shutdown => {
                    *ctx.shared.state.lock().await = ClientState::default();
                    break Some("client shut down".to_string());
                }
            },
        }
    };

    emit_disconnected(&ctx.event_tx, reason).await;
    debug!("transport loop exited");
}

/// Send the join intent on `transport`, then pump commands and server frames
/// until the connection stops. Also reports whether any server message was
/// handled on this connection.
async fn run_connection(transport: &mut dyn Transport, ctx: &mut LoopContext) -> (Exit, bool) {
    let mut heard_from_server = false;

    let join = match serde_json::to_string(&ctx.intent.to_message()) {
        Ok(json) => json,
        Err(e) => {
            error!("failed to serialize join intent: {e}");
            return (Exit::Lost(Some(format!("serialization error: {e}"))), false);
        }
    };
    if let Err(e) = transport.send(join).await {
        error!("failed to send join intent: {e}");
        return (Exit::Lost(Some(format!("transport send error: {e}"))), false);
    }
    info!("join intent sent");
    ctx.shared.connected.store(true, Ordering::Release);
    apply(ctx, dispatch::on_connected).await;

    loop {
        tokio::select! {
            // Branch 1: outgoing intent from the client handle
            cmd = ctx.cmd_rx.recv() => {
                let Some(msg) = cmd else {
                    debug!("command channel closed, shutting down transport loop");
                    return (Exit::Shutdown, heard_from_server);
                };
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if let Err(e) = transport.send(json).await {
                            error!("transport send error: {e}");
                            return (
                                Exit::Lost(Some(format!("transport send error: {e}"))),
                                heard_from_server,
                            );
                        }
                        debug!(?msg, "client message sent");
                    }
                    Err(e) => error!("failed to serialize ClientMessage: {e}"),
                }
            }

            // Branch 2: shutdown signal
            _ = &mut ctx.shutdown_rx => {
                debug!("shutdown signal received");
                return (Exit::Shutdown, heard_from_server);
            }

            // Branch 3: incoming frame from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        let Some(message) = dispatch::decode(&text) else {
                            continue;
                        };
                        heard_from_server = true;
                        if apply(ctx, |s| dispatch::dispatch(s, message)).await {
                            let _ = transport.close().await;
                            let reason = ctx.shared.state.lock().await.notice().map(str::to_string);
                            return (Exit::Ended(reason), heard_from_server);
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        return (
                            Exit::Lost(Some(format!("transport receive error: {e}"))),
                            heard_from_server,
                        );
                    }
                    None => {
                        debug!("transport closed by server");
                        return (Exit::Lost(None), heard_from_server);
                    }
                }
            }
        }
    }
}

/// Wait out the reconnect policy and open a new transport.
async fn reopen(ctx: &mut LoopContext, attempt: &mut u32) -> Reopen {
    let Some(connector) = ctx.connector.clone() else {
        return Reopen::GaveUp;
    };

    loop {
        *attempt += 1;
        let n = *attempt;
        let Some(delay) = ctx.policy.next_delay(n) else {
            info!(attempts = n - 1, "giving up on reconnecting");
            return Reopen::GaveUp;
        };
        apply(ctx, |s| dispatch::on_reconnecting(s, n, delay)).await;
        // Intents aimed at the lost connection are stale.
        while ctx.cmd_rx.try_recv().is_ok() {}

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = &mut ctx.shutdown_rx => return Reopen::Shutdown,
        }

        let opened = tokio::select! {
            opened = connector.connect() => opened,
            _ = &mut ctx.shutdown_rx => return Reopen::Shutdown,
        };
        match opened {
            Ok(transport) => {
                info!(attempt = n, "reconnected");
                return Reopen::Opened(transport);
            }
            Err(e) => warn!(attempt = n, "reconnect failed: {e}"),
        }
    }
}

/// Run one pure transition under the store lock and carry out its effects.
///
/// Returns `true` if the transition asked for the transport to be closed.
async fn apply(ctx: &LoopContext, step: impl FnOnce(ClientState) -> Transition) -> bool {
    let effects = {
        let mut state = ctx.shared.state.lock().await;
        let Transition { state: next, effects } = step(std::mem::take(&mut *state));
        *state = next;
        effects
    };

    let mut close = false;
    for effect in effects {
        match effect {
            Effect::Emit(event) => emit_event(&ctx.event_tx, event),
            Effect::CloseTransport => close = true,
        }
    }
    close
}

/// Queue an event without waiting. A full channel drops it with a warning.
fn emit_event(event_tx: &mpsc::Sender<BuzzerEvent>, event: BuzzerEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit the final [`Disconnected`](BuzzerEvent::Disconnected) event.
///
/// Uses `send().await` rather than `try_send` so it is never dropped.
async fn emit_disconnected(event_tx: &mpsc::Sender<BuzzerEvent>, reason: Option<String>) {
    if event_tx
        .send(BuzzerEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Replays scripted frames and records what the client sends.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, BuzzerError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, BuzzerError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), BuzzerError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, BuzzerError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), BuzzerError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn intent() -> JoinIntent {
        JoinIntent::new("ABCD", "Bob").unwrap()
    }

    #[test]
    fn config_defaults() {
        let config = BuzzerConfig::default();
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.reconnect.next_delay(1), None);
    }

    #[test]
    fn config_clamps_capacity() {
        let config = BuzzerConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn join_intent_is_the_first_and_only_join() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(r#"{"type":"join_success"}"#.into()))]);
        let (mut client, mut events) = BuzzerClient::start(transport, intent(), BuzzerConfig::new());

        assert_eq!(events.recv().await.unwrap(), BuzzerEvent::Connected);
        assert_eq!(events.recv().await.unwrap(), BuzzerEvent::Joined);

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1);
            let first: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(
                first,
                ClientMessage::JoinRoom {
                    code: "ABCD".into(),
                    name: "Bob".into(),
                    picture: None,
                }
            );
        }
        assert!(client.is_connected());
        assert_eq!(client.connection_phase().await, ConnectionPhase::Connected);

        client.shutdown().await;
        assert!(!client.is_connected());
        assert_eq!(client.state().await, ClientState::default());
    }

    #[tokio::test]
    async fn shutdown_closes_transport_and_ends_with_disconnected() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = BuzzerClient::start(transport, intent(), BuzzerConfig::new());
        assert_eq!(events.recv().await.unwrap(), BuzzerEvent::Connected);

        client.shutdown().await;
        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(
            events.recv().await.unwrap(),
            BuzzerEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn debug_output_mentions_connection() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, _events) = BuzzerClient::start(transport, intent(), BuzzerConfig::new());
        let dbg = format!("{client:?}");
        assert!(dbg.contains("BuzzerClient"));
        assert!(dbg.contains("connected"));
        client.shutdown().await;
    }
}
