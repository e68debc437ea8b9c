//! Notification HTTP API client.
//!
//! The realtime channel is receive-only; every notification mutation is
//! confirmed to the server over plain HTTP through this interface.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::models::Notification;

/// Server-side notification operations.
///
/// The feed consumes this to load the authoritative collection and to
/// confirm optimistic local mutations.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetch the user's full notification collection, newest first.
    async fn list(&self, user_id: i64) -> Result<Vec<Notification>>;

    /// Fetch the server's unread count without loading the collection.
    async fn unread_count(&self, user_id: i64) -> Result<u64>;

    /// Mark a single notification as read.
    async fn mark_read(&self, notification_id: i64) -> Result<()>;

    /// Mark every notification of the user as read.
    async fn mark_all_read(&self, user_id: i64) -> Result<()>;

    /// Delete a single notification.
    async fn delete(&self, notification_id: i64) -> Result<()>;

    /// Delete every notification of the user.
    async fn delete_all(&self, user_id: i64) -> Result<()>;
}

#[derive(Deserialize)]
struct UnreadCountResponse {
    count: u64,
}

/// Client for the Plyst notification endpoints.
pub struct HttpNotificationApi {
    http_client: Client,
    base_url: String,
}

impl HttpNotificationApi {
    /// Create a new client against the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn list(&self, user_id: i64) -> Result<Vec<Notification>> {
        let url = format!("{}/notifications/{}", self.base_url, user_id);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn unread_count(&self, user_id: i64) -> Result<u64> {
        let url = format!("{}/notifications/{}/unread-count", self.base_url, user_id);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?;

        let body: UnreadCountResponse = response.json().await?;
        Ok(body.count)
    }

    async fn mark_read(&self, notification_id: i64) -> Result<()> {
        let url = format!("{}/notifications/{}/read", self.base_url, notification_id);
        self.http_client
            .patch(&url)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<()> {
        let url = format!("{}/notifications/{}/read-all", self.base_url, user_id);
        self.http_client
            .patch(&url)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn delete(&self, notification_id: i64) -> Result<()> {
        let url = format!("{}/notifications/{}", self.base_url, notification_id);
        self.http_client
            .delete(&url)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn delete_all(&self, user_id: i64) -> Result<()> {
        let url = format!("{}/notifications/user/{}", self.base_url, user_id);
        self.http_client
            .delete(&url)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
