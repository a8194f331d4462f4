//! Realtime leak-alert listener with bounded reconnect.
//!
//! Connects to the backend's alert WebSocket, keeps every message whose
//! `status` is `"potential_leak"` in an append-only in-memory log, and
//! fans them out through a [`tokio::sync::broadcast`] channel.
//!
//! The socket lifecycle is an explicit state machine ([`Lifecycle`]):
//!
//! ```text
//! Connecting ──open──▶ Open ──close──▶ Retrying(n) ──delay──▶ Connecting
//!      │                                    │
//!      └──────────────close─────────────────┘   n == max ──▶ Exhausted
//! ```
//!
//! A failed connect counts as a close. Opening resets the retry counter.
//! Once `max_retries` reconnects in a row have failed to stay open the
//! listener stops for good.
//!
//! # Example
//!
//! ```rust,ignore
//! use leakwatch_api::alerts::{AlertListener, ListenerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let listener = AlertListener::spawn(ws_url, ListenerConfig::default(), CancellationToken::new());
//! let mut rx = listener.subscribe();
//! while let Ok(alert) = rx.recv().await {
//!     println!("leak at {}", alert.location().unwrap_or("?"));
//! }
//! listener.shutdown();
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

/// The only status the listener records.
pub const POTENTIAL_LEAK: &str = "potential_leak";

const ALERT_CHANNEL_CAPACITY: usize = 256;

// ── LeakAlert ────────────────────────────────────────────────────────

/// A leak alert pushed by the backend.
///
/// Only `status` is interpreted; every other field is kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakAlert {
    pub status: String,

    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,

    /// Local arrival time.
    #[serde(skip, default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl LeakAlert {
    pub fn location(&self) -> Option<&str> {
        self.field_str("location")
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(serde_json::Value::as_str)
    }
}

// ── Configuration ────────────────────────────────────────────────────

/// Fixed-delay, bounded reconnect settings.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Wait between a close and the next connect. Default: 5s.
    pub reconnect_delay: Duration,

    /// Reconnects allowed without an intervening successful open. Default: 5.
    pub max_retries: u32,

    /// Optional `Authorization` header for the upgrade request.
    pub authorization: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(5000),
            max_retries: 5,
            authorization: None,
        }
    }
}

// ── State machine ────────────────────────────────────────────────────

/// Observable listener state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Connecting,
    Open,
    /// Waiting to reconnect; `retry` is the reconnect about to be made (1-based).
    Retrying { retry: u32 },
    /// Retry budget spent; only a new listener resumes.
    Exhausted,
    /// Torn down by its owner.
    Stopped,
}

/// Inputs to the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Closed,
    RetryDue,
    Shutdown,
}

/// What the driver does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Read,
    ReconnectAfter(Duration),
    Stop,
}

/// Transition table for the socket lifecycle.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ListenerState,
    retries: u32,
    max_retries: u32,
    delay: Duration,
}

impl Lifecycle {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            state: ListenerState::Connecting,
            retries: 0,
            max_retries,
            delay,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn handle(&mut self, event: SocketEvent) -> Action {
        let (state, action) = match (self.state, event) {
            (ListenerState::Exhausted | ListenerState::Stopped, _) => (self.state, Action::Stop),
            (_, SocketEvent::Shutdown) => (ListenerState::Stopped, Action::Stop),
            (ListenerState::Connecting, SocketEvent::Opened) => {
                self.retries = 0;
                (ListenerState::Open, Action::Read)
            }
            (ListenerState::Connecting | ListenerState::Open, SocketEvent::Closed) => {
                if self.retries < self.max_retries {
                    self.retries += 1;
                    (
                        ListenerState::Retrying {
                            retry: self.retries,
                        },
                        Action::ReconnectAfter(self.delay),
                    )
                } else {
                    (ListenerState::Exhausted, Action::Stop)
                }
            }
            (ListenerState::Retrying { .. }, SocketEvent::RetryDue) => {
                (ListenerState::Connecting, Action::Connect)
            }
            // Anything else is out of order for the current state; hold still.
            (state, _) => (state, action_for(state)),
        };
        self.state = state;
        action
    }
}

fn action_for(state: ListenerState) -> Action {
    match state {
        ListenerState::Connecting => Action::Connect,
        ListenerState::Open => Action::Read,
        ListenerState::Retrying { .. } => Action::ReconnectAfter(Duration::ZERO),
        ListenerState::Exhausted | ListenerState::Stopped => Action::Stop,
    }
}

// ── Alert log ────────────────────────────────────────────────────────

/// Append-only, arrival-ordered alert sequence. Never evicts.
#[derive(Debug, Default)]
pub struct AlertLog {
    alerts: RwLock<Vec<Arc<LeakAlert>>>,
}

impl AlertLog {
    fn push(&self, alert: Arc<LeakAlert>) {
        self.alerts
            .write()
            .expect("alert log lock poisoned")
            .push(alert);
    }

    pub fn snapshot(&self) -> Vec<Arc<LeakAlert>> {
        self.alerts.read().expect("alert log lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.read().expect("alert log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── AlertListener ────────────────────────────────────────────────────

/// Handle to a running alert listener.
///
/// Dropping the handle, or calling [`shutdown`](Self::shutdown), cancels the
/// background task and closes the socket.
pub struct AlertListener {
    log: Arc<AlertLog>,
    alert_rx: broadcast::Receiver<Arc<LeakAlert>>,
    state_rx: watch::Receiver<ListenerState>,
    attempts: Arc<AtomicU32>,
    cancel: CancellationToken,
}

impl AlertListener {
    /// Spawn the connection loop. Returns immediately; the first connect
    /// happens on the background task.
    pub fn spawn(ws_url: Url, config: ListenerConfig, cancel: CancellationToken) -> Self {
        let (alert_tx, alert_rx) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ListenerState::Connecting);
        let log = Arc::new(AlertLog::default());
        let attempts = Arc::new(AtomicU32::new(0));

        let driver = Driver {
            url: ws_url,
            config,
            log: Arc::clone(&log),
            alert_tx,
            state_tx,
            attempts: Arc::clone(&attempts),
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());

        Self {
            log,
            alert_rx,
            state_rx,
            attempts,
            cancel,
        }
    }

    /// Every alert recorded so far, in arrival order.
    pub fn alerts(&self) -> Vec<Arc<LeakAlert>> {
        self.log.snapshot()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// New alerts as they arrive. Receivers that fall behind get
    /// [`broadcast::error::RecvError::Lagged`]; the log itself loses nothing.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LeakAlert>> {
        self.alert_rx.resubscribe()
    }

    /// New alerts as a stream. Ends when the listener stops.
    pub fn stream(&self) -> impl Stream<Item = Arc<LeakAlert>> + Send + 'static {
        let mut rx = self.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(alert) => yield alert,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "alert subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state_rx.clone()
    }

    /// Connection attempts made so far, the initial one included.
    pub fn connect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Signal the background task to close the socket and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for AlertListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background driver ────────────────────────────────────────────────

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct Driver {
    url: Url,
    config: ListenerConfig,
    log: Arc<AlertLog>,
    alert_tx: broadcast::Sender<Arc<LeakAlert>>,
    state_tx: watch::Sender<ListenerState>,
    attempts: Arc<AtomicU32>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(self) {
        let mut lifecycle = Lifecycle::new(self.config.max_retries, self.config.reconnect_delay);

        loop {
            self.publish(&lifecycle);
            self.attempts.fetch_add(1, Ordering::Relaxed);

            let connected = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.open() => result,
            };

            match connected {
                Ok(mut socket) => {
                    lifecycle.handle(SocketEvent::Opened);
                    self.publish(&lifecycle);
                    tracing::info!(url = %self.url, "alert socket open");
                    self.read_until_closed(&mut socket).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, url = %self.url, "alert socket error");
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            match lifecycle.handle(SocketEvent::Closed) {
                Action::ReconnectAfter(delay) => {
                    self.publish(&lifecycle);
                    tracing::info!(
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        retry = lifecycle.retries(),
                        max_retries = self.config.max_retries,
                        "alert socket closed, reconnecting"
                    );
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    lifecycle.handle(SocketEvent::RetryDue);
                }
                _ => {
                    self.publish(&lifecycle);
                    tracing::error!(
                        max_retries = self.config.max_retries,
                        "alert socket reconnect limit reached, giving up"
                    );
                    return;
                }
            }
        }

        lifecycle.handle(SocketEvent::Shutdown);
        self.publish(&lifecycle);
        tracing::debug!("alert listener stopped");
    }

    fn publish(&self, lifecycle: &Lifecycle) {
        self.state_tx.send_replace(lifecycle.state());
    }

    async fn open(&self) -> Result<Socket, Error> {
        tracing::info!(url = %self.url, "connecting to alert socket");

        let uri: tungstenite::http::Uri = self
            .url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(ref authorization) = self.config.authorization {
            request = request.with_header("Authorization", authorization);
        }

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
        Ok(socket)
    }

    /// Read frames until the peer closes, the stream errors, or we are cancelled.
    async fn read_until_closed(&self, socket: &mut Socket) {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    if let Err(e) = socket.close(None).await {
                        tracing::debug!(error = %e, "alert socket close handshake failed");
                    }
                    return;
                }
                frame = socket.next() => match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        record_message(&text, &self.log, &self.alert_tx);
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "alert socket close frame");
                        }
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary, ping, pong -- tungstenite answers pings itself
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "alert socket error");
                        return;
                    }
                    None => {
                        tracing::info!("alert socket stream ended");
                        return;
                    }
                }
            }
        }
    }
}

// ── Message handling ─────────────────────────────────────────────────

/// Record a text frame if it is a potential-leak alert.
///
/// Returns `true` when the alert was appended.
fn record_message(
    text: &str,
    log: &AlertLog,
    alert_tx: &broadcast::Sender<Arc<LeakAlert>>,
) -> bool {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed alert payload");
            return false;
        }
    };

    if value.get("status").and_then(serde_json::Value::as_str) != Some(POTENTIAL_LEAK) {
        tracing::trace!("ignoring non-leak message");
        return false;
    }

    let alert = match serde_json::from_value::<LeakAlert>(value) {
        Ok(alert) => Arc::new(alert),
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed alert payload");
            return false;
        }
    };

    log.push(Arc::clone(&alert));
    // No subscribers is fine; the log already has it.
    let _ = alert_tx.send(alert);
    true
}

// ── Tests ────────────────────────────────────────────────────────────
