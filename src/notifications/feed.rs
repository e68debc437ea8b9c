//! In-memory notification feed.
//!
//! Holds the ordered notification sequence for one user, newest first.
//! Mutations apply locally first and confirm to the server in a background
//! task; a failed confirmation leaves local state standing until the next
//! full refresh overwrites it with server truth.

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::api::NotificationApi;
use super::models::Notification;

/// Ordered notification collection for one user.
///
/// Holds at most one record per notification id. All mutating operations
/// are optimistic: the local change is visible synchronously and the
/// confirming request runs in a spawned task, so callers must be on a
/// tokio runtime.
pub struct NotificationFeed {
    user_id: i64,
    api: Arc<dyn NotificationApi>,
    items: RwLock<Vec<Notification>>,
}

impl NotificationFeed {
    /// Create an empty feed for the given user.
    pub fn new(user_id: i64, api: Arc<dyn NotificationApi>) -> Self {
        Self {
            user_id,
            api,
            items: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of the current sequence, newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.items.read().unwrap().clone()
    }

    /// Number of unread records. Derived on every call, never stored.
    pub fn unread_count(&self) -> usize {
        self.items.read().unwrap().iter().filter(|n| !n.is_read).count()
    }

    /// Replace the sequence with the server's current collection.
    ///
    /// On failure the sequence keeps its current contents.
    pub async fn refresh(&self) {
        match self.api.list(self.user_id).await {
            Ok(notifications) => {
                debug!(
                    "Loaded {} notifications for user {}",
                    notifications.len(),
                    self.user_id
                );
                *self.items.write().unwrap() = notifications;
            }
            Err(e) => {
                warn!(
                    "Failed to fetch notifications for user {}: {}",
                    self.user_id, e
                );
            }
        }
    }

    /// Prepend a push-delivered record.
    ///
    /// An existing record with the same id is replaced, so a push that
    /// races a refresh already containing it cannot duplicate the entry.
    pub fn push(&self, notification: Notification) {
        let mut items = self.items.write().unwrap();
        items.retain(|n| n.id != notification.id);
        items.insert(0, notification);
    }

    /// Mark one record as read. No-op locally if the id is unknown; the
    /// confirming request is issued either way.
    pub fn mark_as_read(&self, notification_id: i64) {
        {
            let mut items = self.items.write().unwrap();
            if let Some(notification) = items.iter_mut().find(|n| n.id == notification_id) {
                notification.is_read = true;
            }
        }

        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.mark_read(notification_id).await {
                warn!(
                    "Failed to confirm mark-as-read for notification {}: {}",
                    notification_id, e
                );
            }
        });
    }

    /// Mark every record as read.
    pub fn mark_all_as_read(&self) {
        {
            let mut items = self.items.write().unwrap();
            for notification in items.iter_mut() {
                notification.is_read = true;
            }
        }

        let api = self.api.clone();
        let user_id = self.user_id;
        tokio::spawn(async move {
            if let Err(e) = api.mark_all_read(user_id).await {
                warn!(
                    "Failed to confirm mark-all-as-read for user {}: {}",
                    user_id, e
                );
            }
        });
    }

    /// Remove one record.
    pub fn delete(&self, notification_id: i64) {
        self.items
            .write()
            .unwrap()
            .retain(|n| n.id != notification_id);

        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.delete(notification_id).await {
                warn!(
                    "Failed to confirm delete of notification {}: {}",
                    notification_id, e
                );
            }
        });
    }

    /// Empty the sequence.
    pub fn clear_all(&self) {
        self.items.write().unwrap().clear();

        let api = self.api.clone();
        let user_id = self.user_id;
        tokio::spawn(async move {
            if let Err(e) = api.delete_all(user_id).await {
                warn!("Failed to confirm clear-all for user {}: {}", user_id, e);
            }
        });
    }
}
