//! Client configuration.

use std::time::Duration;

/// Configuration for one realtime client instance.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint. The user identity is appended as a query
    /// parameter on connect.
    pub ws_url: String,
    /// Base URL for the notification HTTP API.
    pub api_base_url: String,
    /// Delay before retrying after an abnormal closure.
    pub reconnect_delay: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://plyst.info/ws".to_string(),
            api_base_url: "https://plyst.info/api".to_string(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}
