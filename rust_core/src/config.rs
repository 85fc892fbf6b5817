//! Configuration constants and environment loading for the ingestion side.

use crate::store::DEFAULT_WRITE_TIMEOUT;
use std::env;
use std::time::Duration;

/// Default simulation server endpoint
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:6789";

/// Identification token sent as the first message after connecting
pub const DEFAULT_CLIENT_ROLE: &str = "Visualizer";

/// Default budget for the WebSocket handshake plus identification
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20;

/// Default interval between ingestion stats log lines
pub const DEFAULT_STATS_LOG_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub server_url: String,
    pub client_role: String,
    pub connect_timeout: Duration,
    pub store_write_timeout: Duration,
    pub stats_log_interval: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            client_role: DEFAULT_CLIENT_ROLE.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            store_write_timeout: DEFAULT_WRITE_TIMEOUT,
            stats_log_interval: Duration::from_secs(DEFAULT_STATS_LOG_INTERVAL_SECS),
        }
    }
}

impl IngestionConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        let server_url =
            env::var("SCOREBOARD_WS_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());

        let client_role = env::var("SCOREBOARD_CLIENT_ROLE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_ROLE.to_string());

        let connect_timeout = Duration::from_secs(
            env::var("SCOREBOARD_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
                .max(1),
        );

        let store_write_timeout = env::var("SCOREBOARD_STORE_WRITE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_WRITE_TIMEOUT);

        let stats_log_interval = Duration::from_secs(
            env::var("STATS_LOG_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_STATS_LOG_INTERVAL_SECS)
                .max(1),
        );

        Self {
            server_url,
            client_role,
            connect_timeout,
            store_write_timeout,
            stats_log_interval,
        }
    }
}
