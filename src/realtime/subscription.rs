//! Per-identity session wiring and identity lifecycle.
//!
//! A [`RealtimeSession`] ties one user identity to a notification feed and
//! a managed connection, routing inbound traffic to the feed and to the
//! consumer's callbacks. A [`RealtimeClient`] sits above it and follows
//! the identity: supply `Some(user_id)` to come online, `None` to tear
//! down, a different id to reconnect fresh. Nothing survives an identity
//! change; the new session starts with an empty feed.

use std::sync::{Arc, Mutex, RwLock};

use tracing::info;

use crate::config::RealtimeConfig;
use crate::notifications::{HttpNotificationApi, Notification, NotificationApi, NotificationFeed};

use super::broadcast::BroadcastEvent;
use super::connection::{Inbound, RealtimeConnection};

/// Callback invoked for each pushed notification.
pub type NotificationCallback = Arc<dyn Fn(Notification) + Send + Sync>;

/// Callback invoked for each domain broadcast.
pub type BroadcastCallback = Arc<dyn Fn(BroadcastEvent) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_new_notification: Option<NotificationCallback>,
    on_broadcast: Option<BroadcastCallback>,
}

/// Routing target handed to the connection: feeds the store and invokes
/// whatever callbacks are registered at the moment of delivery.
struct SessionSink {
    feed: Arc<NotificationFeed>,
    callbacks: Arc<RwLock<Callbacks>>,
}

impl Inbound for SessionSink {
    fn channel_opened(&self) {
        let feed = self.feed.clone();
        tokio::spawn(async move {
            feed.refresh().await;
        });
    }

    fn notification_pushed(&self, notification: Notification) {
        self.feed.push(notification.clone());
        // Clone the callback out of the lock so a handler that swaps
        // callbacks can't deadlock against us.
        let callback = self.callbacks.read().unwrap().on_new_notification.clone();
        if let Some(callback) = callback {
            callback(notification);
        }
    }

    fn broadcast(&self, event: BroadcastEvent) {
        let callback = self.callbacks.read().unwrap().on_broadcast.clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }
}

/// One user's live realtime state: notification feed plus managed
/// connection.
///
/// Callbacks can be swapped at any time without touching the connection;
/// the latest ones are always the ones invoked. Must be created and used
/// within a tokio runtime.
pub struct RealtimeSession {
    user_id: i64,
    feed: Arc<NotificationFeed>,
    connection: RealtimeConnection,
    callbacks: Arc<RwLock<Callbacks>>,
}

impl RealtimeSession {
    /// Create the session and open the channel.
    pub fn spawn(user_id: i64, config: RealtimeConfig) -> Self {
        let api = Arc::new(HttpNotificationApi::new(config.api_base_url.clone()));
        Self::spawn_with_api(user_id, config, api)
    }

    /// Create the session against a custom API implementation.
    pub fn spawn_with_api(
        user_id: i64,
        config: RealtimeConfig,
        api: Arc<dyn NotificationApi>,
    ) -> Self {
        let feed = Arc::new(NotificationFeed::new(user_id, api));
        let callbacks = Arc::new(RwLock::new(Callbacks::default()));
        let sink = Arc::new(SessionSink {
            feed: feed.clone(),
            callbacks: callbacks.clone(),
        });
        let connection = RealtimeConnection::new(user_id, config, sink);
        connection.connect();

        Self {
            user_id,
            feed,
            connection,
            callbacks,
        }
    }

    /// Identity this session is scoped to.
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Register (or replace) the pushed-notification callback.
    pub fn set_on_new_notification(&self, callback: Option<NotificationCallback>) {
        self.callbacks.write().unwrap().on_new_notification = callback;
    }

    /// Register (or replace) the broadcast callback.
    pub fn set_on_broadcast(&self, callback: Option<BroadcastCallback>) {
        self.callbacks.write().unwrap().on_broadcast = callback;
    }

    /// Ask the connection to (re)open. No-op while connecting or open.
    pub fn connect(&self) {
        self.connection.connect();
    }

    /// Whether the channel is currently established.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Snapshot of the notification sequence, newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.feed.notifications()
    }

    /// Count of unread notifications.
    pub fn unread_count(&self) -> usize {
        self.feed.unread_count()
    }

    /// Manually refetch the collection from the server.
    pub async fn refetch(&self) {
        self.feed.refresh().await;
    }

    /// Mark one notification as read (optimistic).
    pub fn mark_as_read(&self, notification_id: i64) {
        self.feed.mark_as_read(notification_id);
    }

    /// Mark every notification as read (optimistic).
    pub fn mark_all_as_read(&self) {
        self.feed.mark_all_as_read();
    }

    /// Delete one notification (optimistic).
    pub fn delete_notification(&self, notification_id: i64) {
        self.feed.delete(notification_id);
    }

    /// Delete every notification (optimistic).
    pub fn clear_all(&self) {
        self.feed.clear_all();
    }

    /// Close the channel and cancel any pending reconnect.
    pub fn shutdown(&self) {
        self.connection.shutdown();
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Identity-scoped realtime client.
///
/// Owns at most one [`RealtimeSession`] and recreates it as the active
/// identity changes. Callbacks registered here outlive sessions: they are
/// re-applied to every session the client spawns.
pub struct RealtimeClient {
    config: RealtimeConfig,
    on_new_notification: Mutex<Option<NotificationCallback>>,
    on_broadcast: Mutex<Option<BroadcastCallback>>,
    session: Mutex<Option<Arc<RealtimeSession>>>,
}

impl RealtimeClient {
    /// Create a client with no active identity.
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            on_new_notification: Mutex::new(None),
            on_broadcast: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// Set the active identity.
    ///
    /// `None` tears the session down. A changed id tears down and spawns a
    /// fresh session (in-memory notifications are discarded). Setting the
    /// current identity again is a no-op.
    pub fn set_identity(&self, identity: Option<i64>) {
        let mut session = self.session.lock().unwrap();

        if session.as_ref().map(|s| s.user_id()) == identity {
            return;
        }

        if let Some(previous) = session.take() {
            info!("Realtime identity cleared (was user {})", previous.user_id());
            previous.shutdown();
        }

        if let Some(user_id) = identity {
            info!("Realtime identity set to user {}", user_id);
            let spawned = RealtimeSession::spawn(user_id, self.config.clone());
            spawned.set_on_new_notification(self.on_new_notification.lock().unwrap().clone());
            spawned.set_on_broadcast(self.on_broadcast.lock().unwrap().clone());
            *session = Some(Arc::new(spawned));
        }
    }

    /// Register (or replace) the pushed-notification callback without
    /// reconnecting.
    pub fn set_on_new_notification(&self, callback: Option<NotificationCallback>) {
        *self.on_new_notification.lock().unwrap() = callback.clone();
        if let Some(session) = self.session.lock().unwrap().as_ref() {
            session.set_on_new_notification(callback);
        }
    }

    /// Register (or replace) the broadcast callback without reconnecting.
    pub fn set_on_broadcast(&self, callback: Option<BroadcastCallback>) {
        *self.on_broadcast.lock().unwrap() = callback.clone();
        if let Some(session) = self.session.lock().unwrap().as_ref() {
            session.set_on_broadcast(callback);
        }
    }

    /// The session for the current identity, if one is active.
    pub fn session(&self) -> Option<Arc<RealtimeSession>> {
        self.session.lock().unwrap().clone()
    }

    /// Whether the channel is currently established.
    pub fn is_connected(&self) -> bool {
        self.session().map(|s| s.is_connected()).unwrap_or(false)
    }

    /// Snapshot of the notification sequence; empty with no identity.
    pub fn notifications(&self) -> Vec<Notification> {
        self.session()
            .map(|s| s.notifications())
            .unwrap_or_default()
    }

    /// Count of unread notifications; zero with no identity.
    pub fn unread_count(&self) -> usize {
        self.session().map(|s| s.unread_count()).unwrap_or(0)
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.lock().unwrap().take() {
            session.shutdown();
        }
    }
}
