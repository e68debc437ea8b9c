//! Inbound frame decoding.
//!
//! Every server-to-client frame is a JSON object with a `type`
//! discriminator. Decoding never takes the channel down: malformed frames
//! come back as errors for the caller to log and drop, and frames with an
//! unrecognized type decode to `None`.

use serde_json::Value;
use thiserror::Error;

use crate::notifications::Notification;

use super::broadcast::BroadcastEvent;

/// A decoded server-to-client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Handshake acknowledgement sent right after the channel opens.
    Connected,
    /// A notification pushed to this user.
    NewNotification(Notification),
    /// A domain mutation broadcast to all connected clients.
    Broadcast(BroadcastEvent),
}

/// Error decoding an inbound frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("frame has no string \"type\" field")]
    MissingType,

    #[error("{frame_type} frame is missing its \"{field}\" field")]
    MissingField {
        frame_type: &'static str,
        field: &'static str,
    },

    #[error("invalid {frame_type} payload: {source}")]
    InvalidPayload {
        frame_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a raw text frame.
///
/// Returns `Ok(None)` for frames whose `type` is not part of the protocol
/// and `Err` for frames that claim a known type but do not match its
/// shape. Neither outcome terminates the channel.
pub fn decode_frame(text: &str) -> Result<Option<ServerFrame>, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
    let frame_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;

    match frame_type {
        // The handshake carries an informational message we don't need.
        "connected" => Ok(Some(ServerFrame::Connected)),
        "new_notification" => {
            let payload = value
                .get("notification")
                .cloned()
                .ok_or(DecodeError::MissingField {
                    frame_type: "new_notification",
                    field: "notification",
                })?;
            let notification: Notification =
                serde_json::from_value(payload).map_err(|e| DecodeError::InvalidPayload {
                    frame_type: "new_notification",
                    source: e,
                })?;
            Ok(Some(ServerFrame::NewNotification(notification)))
        }
        broadcast if BroadcastEvent::WIRE_TYPES.contains(&broadcast) => {
            let event: BroadcastEvent =
                serde_json::from_value(value).map_err(|e| DecodeError::InvalidPayload {
                    frame_type: "broadcast",
                    source: e,
                })?;
            Ok(Some(ServerFrame::Broadcast(event)))
        }
        _ => Ok(None),
    }
}
