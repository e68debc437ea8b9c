//! Notification data models

use serde::{Deserialize, Serialize};

/// Notification kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Playlist,
    Ai,
}

/// A user notification as delivered by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Emoji or image URL identifying the actor.
    pub avatar: String,
    pub is_read: bool,
    /// Domain object the notification concerns (e.g. a playlist id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    /// Relative display time ("5 minutes ago").
    pub time: String,
    /// Canonical timestamp.
    pub created_at: String,
}
