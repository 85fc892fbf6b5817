//! Server stream: connection lifecycle, reconnect policy and ingestion.

pub mod ingestion;
pub mod reconnect;

pub use ingestion::{IngestionLoop, IngestionState, IngestionStats, IngestionStatsSnapshot};
pub use reconnect::{ReconnectConfig, ReconnectStats};
