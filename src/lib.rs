//! Plyst Realtime Client Library
//!
//! Client-side realtime subsystem for the Plyst social playlist app:
//! maintains a persistent WebSocket channel to the server, keeps an
//! eventually-consistent notification feed in sync with the push stream,
//! and fans out typed domain broadcast events to the embedding application.

pub mod config;
pub mod notifications;
pub mod realtime;

// Re-export commonly used types for convenience
pub use config::RealtimeConfig;
pub use notifications::{HttpNotificationApi, Notification, NotificationApi, NotificationKind};
pub use realtime::{
    BroadcastEvent, CommentSnapshot, PlaylistSnapshot, RealtimeClient, RealtimeSession,
};
