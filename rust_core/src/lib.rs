//! Dilemma Core - live ingestion of iterated Prisoner's Dilemma results.
//!
//! This crate provides:
//! - Decoding of round events streamed by the simulation server
//! - A session-partitioned, thread-safe store of round records
//! - Session resolution for events that omit their session id
//! - The ingestion loop: connect, identify, stream, reconnect with backoff

pub mod config;
pub mod decoder;
pub mod error;
pub mod models;
pub mod resolver;
pub mod store;
pub mod stream;

pub use config::IngestionConfig;
pub use error::{DecodeError, ScoreboardError};
pub use models::{PlayerTotals, RoundEvent, RoundRecord, SessionId, SessionSummary};
pub use store::SessionStore;
pub use stream::{IngestionLoop, IngestionState, ReconnectConfig};
