//! Realtime channel subsystem.
//!
//! The server pushes two families of traffic over one WebSocket: personal
//! notifications for the connected user, and domain broadcasts describing
//! mutations happening elsewhere in the system (playlists, comments,
//! counters). This module owns the channel lifecycle and the typed
//! decoding/dispatch of that traffic.

mod broadcast;
mod connection;
mod messages;
mod subscription;

pub use broadcast::{
    BroadcastEvent, CommentAuthor, CommentSnapshot, PlaylistOwner, PlaylistSnapshot, TrackSnapshot,
};
pub use connection::{ConnectionState, Inbound, RealtimeConnection};
pub use messages::{decode_frame, DecodeError, ServerFrame};
pub use subscription::{BroadcastCallback, NotificationCallback, RealtimeClient, RealtimeSession};
