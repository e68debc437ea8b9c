//! WebSocket connection management.
//!
//! Owns the lifecycle of the single logical connection for one user
//! identity: open, handshake, inbound dispatch, closure detection, and
//! scheduled reconnection. Consumers observe the connection only through
//! `is_connected`; there is no separate error channel, a dropped channel
//! degrades to "notifications stop updating live" until the next
//! successful reconnect resynchronizes state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RealtimeConfig;
use crate::notifications::Notification;

use super::broadcast::BroadcastEvent;
use super::messages::{decode_frame, ServerFrame};

/// Close codes that must not trigger a reconnect: normal closure and
/// going-away. The server closes with going-away when the same identity
/// connects from elsewhere and that session must stay down.
const NO_RETRY_CLOSE_CODES: [u16; 2] = [1000, 1001];

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none pending.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The channel is established.
    Open,
    /// The channel dropped abnormally; a retry is scheduled.
    ClosedWillRetry,
}

/// Sink for decoded inbound traffic.
pub trait Inbound: Send + Sync + 'static {
    /// The channel just opened. The consumer should resynchronize state
    /// that may have been missed while disconnected.
    fn channel_opened(&self);

    /// A notification addressed to this user was pushed.
    fn notification_pushed(&self, notification: Notification);

    /// A domain broadcast arrived.
    fn broadcast(&self, event: BroadcastEvent);
}

/// Manages the single logical WebSocket connection for one user identity.
///
/// At most one live socket exists per manager: `connect` is a no-op while
/// a connection is in flight or open. Abnormal closures schedule a
/// reconnect after the configured delay, indefinitely; `shutdown` cancels
/// the socket and any pending retry. Must be driven from within a tokio
/// runtime.
pub struct RealtimeConnection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    user_id: i64,
    config: RealtimeConfig,
    sink: Arc<dyn Inbound>,
    state: Mutex<ConnectionState>,
    connected: AtomicBool,
    /// Bumped on every connection attempt and on shutdown. A socket task
    /// whose generation is stale has been superseded and must not touch
    /// shared state or schedule retries.
    generation: AtomicU64,
    /// Cancels the pending reconnect timer, if one is armed.
    retry: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
}

impl RealtimeConnection {
    /// Create a manager for the given identity. Does not connect.
    pub fn new(user_id: i64, config: RealtimeConfig, sink: Arc<dyn Inbound>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                user_id,
                config,
                sink,
                state: Mutex::new(ConnectionState::Idle),
                connected: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                retry: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Open the channel. No-op while a connection is in flight or open.
    pub fn connect(&self) {
        ConnectionInner::connect(self.inner.clone());
    }

    /// Whether the channel is currently established.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock().unwrap()
    }

    /// Tear down: close the socket and cancel any pending retry. The
    /// manager never reconnects after this.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.inner.retry.lock().unwrap().take() {
            token.cancel();
        }
        self.inner.connected.store(false, Ordering::SeqCst);
        *self.inner.state.lock().unwrap() = ConnectionState::Idle;
        debug!("Realtime connection for user {} shut down", self.inner.user_id);
    }
}

impl ConnectionInner {
    fn connect(this: Arc<Self>) {
        if this.shutdown.is_cancelled() {
            return;
        }

        {
            let mut state = this.state.lock().unwrap();
            match *state {
                ConnectionState::Connecting | ConnectionState::Open => {
                    debug!("Connect ignored, channel already {:?}", *state);
                    return;
                }
                ConnectionState::Idle | ConnectionState::ClosedWillRetry => {}
            }
            *state = ConnectionState::Connecting;
        }

        // This connect supersedes any scheduled retry.
        if let Some(token) = this.retry.lock().unwrap().take() {
            token.cancel();
        }

        let generation = this.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(async move {
            this.run_socket(generation).await;
        });
    }

    fn still_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run_socket(self: Arc<Self>, generation: u64) {
        let url = format!("{}?userId={}", self.config.ws_url, self.user_id);
        debug!("Opening realtime channel for user {}", self.user_id);

        let shutdown = self.shutdown.clone();
        let stream = tokio::select! {
            result = connect_async(&url) => match result {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("Realtime connection failed: {}", e);
                    self.handle_closed(generation, None);
                    return;
                }
            },
            _ = shutdown.cancelled() => return,
        };

        if !self.still_current(generation) {
            // A newer connect superseded this attempt while it was in
            // flight; the new socket owns the shared state now.
            return;
        }

        *self.state.lock().unwrap() = ConnectionState::Open;
        self.connected.store(true, Ordering::SeqCst);
        info!("Realtime channel open for user {}", self.user_id);

        // Resynchronize missed state. Not awaited: push frames may arrive
        // while the refresh is still in flight.
        self.sink.channel_opened();

        let (mut write, mut read) = stream.split();
        let mut close_code: Option<u16> = None;

        loop {
            let message = tokio::select! {
                message = read.next() => message,
                _ = self.shutdown.cancelled() => break,
            };

            let Some(message) = message else {
                break;
            };

            match message {
                Ok(Message::Text(text)) => self.handle_frame(text.as_str()),
                Ok(Message::Ping(data)) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        debug!("Failed to send pong: {}", e);
                        break;
                    }
                }
                Ok(Message::Close(frame)) => {
                    close_code = frame.map(|f| u16::from(f.code));
                    debug!(
                        "Realtime channel closed by server (code {:?})",
                        close_code
                    );
                    break;
                }
                Ok(_) => {
                    debug!("Ignoring non-text realtime frame");
                }
                Err(e) => {
                    // Transport errors surface right before the stream
                    // ends; the closure handling below drives recovery.
                    debug!("Realtime channel error: {}", e);
                    break;
                }
            }
        }

        self.handle_closed(generation, close_code);
    }

    fn handle_frame(&self, text: &str) {
        match decode_frame(text) {
            Ok(Some(ServerFrame::Connected)) => {
                debug!("Realtime handshake acknowledged");
            }
            Ok(Some(ServerFrame::NewNotification(notification))) => {
                self.sink.notification_pushed(notification);
            }
            Ok(Some(ServerFrame::Broadcast(event))) => {
                self.sink.broadcast(event);
            }
            Ok(None) => {
                debug!("Ignoring unrecognized realtime frame");
            }
            Err(e) => {
                warn!("Dropping undecodable realtime frame: {}", e);
            }
        }
    }

    /// Shared closure handling for failed connects, server closes, and
    /// transport drops (`close_code` is `None` for the latter two).
    fn handle_closed(self: Arc<Self>, generation: u64, close_code: Option<u16>) {
        if !self.still_current(generation) {
            return;
        }

        self.connected.store(false, Ordering::SeqCst);

        if self.shutdown.is_cancelled() {
            *self.state.lock().unwrap() = ConnectionState::Idle;
            return;
        }

        if matches!(close_code, Some(code) if NO_RETRY_CLOSE_CODES.contains(&code)) {
            info!(
                "Realtime channel for user {} closed (code {:?}), not retrying",
                self.user_id, close_code
            );
            *self.state.lock().unwrap() = ConnectionState::Idle;
            return;
        }

        *self.state.lock().unwrap() = ConnectionState::ClosedWillRetry;
        self.schedule_retry();
    }

    fn schedule_retry(self: Arc<Self>) {
        let delay = self.config.reconnect_delay;
        let token = self.shutdown.child_token();
        if let Some(previous) = self.retry.lock().unwrap().replace(token.clone()) {
            previous.cancel();
        }

        info!(
            "Scheduling realtime reconnect for user {} in {:?}",
            self.user_id, delay
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    Self::connect(self);
                }
                _ = token.cancelled() => {
                    debug!("Pending realtime reconnect cancelled");
                }
            }
        });
    }
}
