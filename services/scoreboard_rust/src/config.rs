//! Configuration for the board side of the service
//!
//! Ingestion and reconnect settings live in `dilemma_core`; this module only
//! covers refresh cadence and table layout.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_TITLE: &str = "Prison-Dilemma Score Board";

/// Default refresh period for the board
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1000;

/// Rows per table page
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub title: String,
    pub refresh_interval: Duration,
    pub page_size: usize,
    /// Clear the terminal before each frame
    pub clear_screen: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            page_size: DEFAULT_PAGE_SIZE,
            clear_screen: true,
        }
    }
}

impl BoardConfig {
    pub fn from_env() -> Result<Self> {
        let title = env::var("SCOREBOARD_TITLE").unwrap_or_else(|_| DEFAULT_TITLE.to_string());

        let refresh_ms = parse_u64_env("SCOREBOARD_REFRESH_INTERVAL_MS", DEFAULT_REFRESH_INTERVAL_MS)
            .context("SCOREBOARD_REFRESH_INTERVAL_MS")?
            .clamp(100, 60_000);

        let page_size = parse_u64_env("SCOREBOARD_PAGE_SIZE", DEFAULT_PAGE_SIZE as u64)
            .context("SCOREBOARD_PAGE_SIZE")? as usize;
        if page_size == 0 {
            return Err(anyhow!("SCOREBOARD_PAGE_SIZE must be at least 1"));
        }

        let clear_screen = parse_bool_env("SCOREBOARD_CLEAR_SCREEN", true);

        Ok(Self {
            title,
            refresh_interval: Duration::from_millis(refresh_ms),
            page_size,
            clear_screen,
        })
    }
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("Invalid {key}: {raw} (expected integer)"))
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
        .unwrap_or(default)
}
