//! Domain broadcast events.
//!
//! Broadcasts are push-delivered signals about shared state (playlists,
//! comments, counters) rather than personal notifications. The union is
//! closed: the codec ignores unrecognized event types instead of failing.
//!
//! Applying these events idempotently is the consumer's responsibility:
//! a `PlaylistCreated` for an id the consumer already holds should be a
//! no-op, not a duplicate insert.

use serde::{Deserialize, Serialize};

/// Owner summary carried in playlist snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistOwner {
    pub id: i64,
    pub nickname: String,
}

/// Track summary carried in playlist snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSnapshot {
    pub id: i64,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_image: Option<String>,
    pub duration_sec: i64,
}

/// Full playlist payload for create/update/visibility events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnapshot {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub is_public: bool,
    pub view_count: i64,
    pub like_count: i64,
    pub owner: PlaylistOwner,
    pub track_count: i64,
    pub tags: Vec<String>,
    pub created_at: String,
    pub tracks: Vec<TrackSnapshot>,
}

/// Author summary carried in comment snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: i64,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Comment payload for comment-added events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnapshot {
    pub id: i64,
    pub content: String,
    pub author: CommentAuthor,
    pub like_count: i64,
    pub is_liked: bool,
    pub created_at: String,
}

/// A mutation to shared domain state, pushed to every connected client.
///
/// Serialized with the event kind in a top-level `type` field and the
/// variant's fields alongside it, matching the server's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BroadcastEvent {
    PlaylistCreated {
        playlist: PlaylistSnapshot,
    },
    PlaylistUpdated {
        playlist: PlaylistSnapshot,
    },
    PlaylistDeleted {
        id: i64,
    },
    CommentAdded {
        playlist_id: i64,
        comment: CommentSnapshot,
    },
    CommentDeleted {
        playlist_id: i64,
        id: i64,
    },
    ShareUpdated {
        playlist_id: i64,
        share_count: i64,
    },
    ViewUpdated {
        playlist_id: i64,
        view_count: i64,
    },
    VisibilityUpdated {
        playlist_id: i64,
        is_public: bool,
        /// Present when the playlist just became public, so consumers can
        /// insert it without a separate fetch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        playlist: Option<PlaylistSnapshot>,
    },
}

impl BroadcastEvent {
    /// Every wire `type` value this union recognizes.
    pub(crate) const WIRE_TYPES: &'static [&'static str] = &[
        "playlist_created",
        "playlist_updated",
        "playlist_deleted",
        "comment_added",
        "comment_deleted",
        "share_updated",
        "view_updated",
        "visibility_updated",
    ];

    /// Get the event type as string for filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            BroadcastEvent::PlaylistCreated { .. } => "playlist_created",
            BroadcastEvent::PlaylistUpdated { .. } => "playlist_updated",
            BroadcastEvent::PlaylistDeleted { .. } => "playlist_deleted",
            BroadcastEvent::CommentAdded { .. } => "comment_added",
            BroadcastEvent::CommentDeleted { .. } => "comment_deleted",
            BroadcastEvent::ShareUpdated { .. } => "share_updated",
            BroadcastEvent::ViewUpdated { .. } => "view_updated",
            BroadcastEvent::VisibilityUpdated { .. } => "visibility_updated",
        }
    }
}
