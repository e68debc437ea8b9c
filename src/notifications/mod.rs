//! User notifications module

mod api;
mod feed;
mod models;

pub use api::{HttpNotificationApi, NotificationApi};
pub use feed::NotificationFeed;
pub use models::{Notification, NotificationKind};
