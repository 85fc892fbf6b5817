//! Reconnection policy for the server stream: exponential backoff with
//! jitter, plus a circuit breaker that pauses attempts after a run of
//! consecutive failures.

use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// How the ingestion loop paces WebSocket reconnects after a failed
/// handshake or a dropped stream.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// Failed connects in a row before attempts pause (default: 10)
    pub max_consecutive_failures: u32,
    /// Delay before the first reconnect, doubled per further failure (default: 1000ms)
    pub base_delay_ms: u64,
    /// Upper bound for a single reconnect delay (default: 60000ms)
    pub max_delay_ms: u64,
    /// Random spread applied to each delay, as a fraction (default: 0.1)
    pub jitter_pct: f64,
    /// Pause once the failure run hits the limit (default: 60s)
    pub circuit_cooldown: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 10,
            base_delay_ms: 1000,
            max_delay_ms: 60000,
            jitter_pct: 0.1,
            circuit_cooldown: Duration::from_secs(60),
        }
    }
}

impl ReconnectConfig {
    /// Read the `WS_RECONNECT_*` variables, keeping defaults for unset or
    /// unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_consecutive_failures: env_or(
                "WS_RECONNECT_MAX_FAILURES",
                defaults.max_consecutive_failures,
            ),
            base_delay_ms: env_or("WS_RECONNECT_BASE_DELAY_MS", defaults.base_delay_ms),
            max_delay_ms: env_or("WS_RECONNECT_MAX_DELAY_MS", defaults.max_delay_ms),
            jitter_pct: env_or("WS_RECONNECT_JITTER_PCT", defaults.jitter_pct),
            circuit_cooldown: Duration::from_secs(env_or(
                "WS_RECONNECT_COOLDOWN_SECS",
                defaults.circuit_cooldown.as_secs(),
            )),
        }
    }

    /// Delay before reconnect `attempt` (1-based; 0 is treated as 1).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay_ms as f64;
        let exponential_ms = base_ms * 2f64.powi(attempt.saturating_sub(1).min(30) as i32);
        let capped_ms = exponential_ms.min(self.max_delay_ms as f64);

        let jitter_range = capped_ms * self.jitter_pct;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_ms = (capped_ms + jitter).max(0.0);

        Duration::from_millis(final_ms as u64)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Connection counters for the server stream, shared with the stats logger.
#[derive(Debug, Default)]
pub struct ReconnectStats {
    /// WebSocket handshakes started
    pub connect_attempts: AtomicU64,
    /// Successful connections (handshake and identification done)
    pub successful_connects: AtomicU64,
    /// Failed attempts and dropped streams
    pub failures: AtomicU64,
    /// Failures since the last successful identification
    pub consecutive_failures: AtomicU32,
}

impl ReconnectStats {
    pub fn record_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_connects.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset_failures(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn get_consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let config = ReconnectConfig {
            jitter_pct: 0.0,
            ..ReconnectConfig::default()
        };

        assert_eq!(config.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(config.calculate_delay(3), Duration::from_millis(4000));
        assert_eq!(config.calculate_delay(6), Duration::from_millis(32000));
        assert_eq!(config.calculate_delay(7), Duration::from_millis(60000));
        assert_eq!(config.calculate_delay(500), Duration::from_millis(60000));
    }

    #[test]
    fn test_attempt_zero_uses_base_delay() {
        let config = ReconnectConfig {
            jitter_pct: 0.0,
            ..ReconnectConfig::default()
        };
        assert_eq!(config.calculate_delay(0), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = ReconnectConfig::default();
        for _ in 0..100 {
            let delay = config.calculate_delay(2).as_millis();
            assert!((1800..=2200).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_env_or_falls_back_on_bad_values() {
        std::env::set_var("SCOREBOARD_TEST_RECONNECT_SET", " 25 ");
        std::env::set_var("SCOREBOARD_TEST_RECONNECT_BAD", "soon");

        assert_eq!(env_or("SCOREBOARD_TEST_RECONNECT_SET", 10u32), 25);
        assert_eq!(env_or("SCOREBOARD_TEST_RECONNECT_BAD", 10u32), 10);
        assert_eq!(env_or("SCOREBOARD_TEST_RECONNECT_UNSET", 0.1f64), 0.1);
    }

    #[test]
    fn test_stats() {
        let stats = ReconnectStats::default();

        stats.record_attempt();
        assert_eq!(stats.connect_attempts.load(Ordering::Relaxed), 1);

        stats.record_failure();
        stats.record_failure();
        assert_eq!(stats.failures.load(Ordering::Relaxed), 2);
        assert_eq!(stats.get_consecutive_failures(), 2);

        stats.record_success();
        assert_eq!(stats.successful_connects.load(Ordering::Relaxed), 1);
        assert_eq!(stats.get_consecutive_failures(), 0);
    }
}
