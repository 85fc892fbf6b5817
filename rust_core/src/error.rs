//! Error taxonomy for the ingestion path.
//!
//! None of these are fatal to the ingestion loop: decode and resolution
//! failures drop one message, store timeouts drop one append, and connection
//! failures send the loop back through reconnect.

use std::time::Duration;
use thiserror::Error;

/// Why an inbound message could not be turned into a round event.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed round event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary frame is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("{team} round must be positive, got {round}")]
    InvalidRound { team: &'static str, round: u32 },
}

#[derive(Debug, Error)]
pub enum ScoreboardError {
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("event has no Session_id and no session has been seen yet")]
    UnresolvedSession,

    #[error("session store write lock not acquired within {waited:?}")]
    StoreContentionTimeout { waited: Duration },
}

impl ScoreboardError {
    pub fn connect(url: &str, reason: impl ToString) -> Self {
        ScoreboardError::Connect {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoreboardError>;
