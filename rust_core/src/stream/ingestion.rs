//! Streaming ingestion of match results from the simulation server.
//!
//! State machine:
//! ```text
//! Disconnected ──> Connecting ──> Streaming ──> Disconnected ──> Reconnecting ──┐
//!       ^               │                                                       │
//!       │               └── (handshake failure / timeout) ──> Disconnected      │
//!       └───────────────────────────────────────────────────────────────────────┘
//! ```
//! A bad message never tears the stream down: decode failures and
//! unresolvable events are counted and dropped. Only a receive error or a
//! closed stream sends the loop back through backoff.

use crate::config::IngestionConfig;
use crate::decoder::{decode_event, decode_event_bytes};
use crate::error::{DecodeError, Result, ScoreboardError};
use crate::models::RoundEvent;
use crate::resolver::{resolve_session, ResolvedSession, SessionSource};
use crate::store::SessionStore;
use crate::stream::reconnect::{ReconnectConfig, ReconnectStats};
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle state, published for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionState {
    Disconnected,
    Connecting,
    Streaming,
    Reconnecting { attempt: u32, delay: Duration },
    Stopped,
}

/// Counters for everything the loop receives and drops
#[derive(Debug, Default)]
pub struct IngestionStats {
    pub messages_received: AtomicU64,
    pub events_applied: AtomicU64,
    pub records_appended: AtomicU64,
    pub decode_failures: AtomicU64,
    pub unresolved_drops: AtomicU64,
    pub store_timeouts: AtomicU64,
    /// Unix millis of the last applied event, 0 if none
    last_event_ms: AtomicI64,
}

impl IngestionStats {
    pub fn snapshot(&self) -> IngestionStatsSnapshot {
        let last_event_ms = self.last_event_ms.load(Ordering::Relaxed);
        IngestionStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            records_appended: self.records_appended.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            unresolved_drops: self.unresolved_drops.load(Ordering::Relaxed),
            store_timeouts: self.store_timeouts.load(Ordering::Relaxed),
            last_event_at: if last_event_ms > 0 {
                Utc.timestamp_millis_opt(last_event_ms).single()
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionStatsSnapshot {
    pub messages_received: u64,
    pub events_applied: u64,
    pub records_appended: u64,
    pub decode_failures: u64,
    pub unresolved_drops: u64,
    pub store_timeouts: u64,
    pub last_event_at: Option<DateTime<Utc>>,
}

enum FrameAction {
    Continue,
    Close,
}

enum StreamEnd {
    Shutdown,
    Closed,
    Failed(ScoreboardError),
}

/// Owns the connection to the simulation server and feeds the session store.
pub struct IngestionLoop {
    config: IngestionConfig,
    reconnect: ReconnectConfig,
    store: Arc<SessionStore>,
    stats: Arc<IngestionStats>,
    reconnect_stats: Arc<ReconnectStats>,
    state: watch::Sender<IngestionState>,
}

impl IngestionLoop {
    pub fn new(config: IngestionConfig, reconnect: ReconnectConfig, store: Arc<SessionStore>) -> Self {
        let (state, _) = watch::channel(IngestionState::Disconnected);
        Self {
            config,
            reconnect,
            store,
            stats: Arc::new(IngestionStats::default()),
            reconnect_stats: Arc::new(ReconnectStats::default()),
            state,
        }
    }

    pub fn stats(&self) -> &Arc<IngestionStats> {
        &self.stats
    }

    pub fn reconnect_stats(&self) -> &Arc<ReconnectStats> {
        &self.reconnect_stats
    }

    pub fn subscribe_state(&self) -> watch::Receiver<IngestionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> IngestionState {
        self.state.borrow().clone()
    }

    fn set_state(&self, next: IngestionState) {
        debug!("Ingestion state -> {:?}", next);
        self.state.send_replace(next);
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting ingestion loop for {}", self.config.server_url);

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Check circuit breaker
            let consecutive_failures = self.reconnect_stats.get_consecutive_failures();
            if consecutive_failures >= self.reconnect.max_consecutive_failures {
                let cooldown = self.reconnect.circuit_cooldown;
                error!(
                    "Circuit breaker OPENED after {} consecutive failures. Pausing reconnection for {:?}",
                    consecutive_failures, cooldown
                );
                self.set_state(IngestionState::Reconnecting {
                    attempt: consecutive_failures,
                    delay: cooldown,
                });
                if sleep_or_shutdown(cooldown, &mut shutdown).await {
                    break;
                }
                self.reconnect_stats.reset_failures();
                continue;
            }

            self.set_state(IngestionState::Connecting);
            self.reconnect_stats.record_attempt();

            let connected = tokio::select! {
                result = self.connect() => result,
                _ = shutdown_requested(&mut shutdown) => break,
            };

            match connected {
                Ok(ws) => {
                    self.reconnect_stats.record_success();
                    info!(
                        "Streaming from {} (total connects: {})",
                        self.config.server_url,
                        self.reconnect_stats.successful_connects.load(Ordering::Relaxed)
                    );
                    self.set_state(IngestionState::Streaming);

                    match self.stream(ws, &mut shutdown).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Closed => warn!("Server closed the stream, will reconnect..."),
                        StreamEnd::Failed(e) => warn!("Stream failed: {}. Will reconnect...", e),
                    }
                    self.reconnect_stats.record_failure();
                }
                Err(e) => {
                    self.reconnect_stats.record_failure();
                    error!("{}", e);
                }
            }

            self.set_state(IngestionState::Disconnected);

            let attempt = self.reconnect_stats.get_consecutive_failures();
            let delay = self.reconnect.calculate_delay(attempt);
            info!("Reconnecting in {:?} (attempt {})", delay, attempt);
            self.set_state(IngestionState::Reconnecting { attempt, delay });
            if sleep_or_shutdown(delay, &mut shutdown).await {
                break;
            }
        }

        self.set_state(IngestionState::Stopped);
        info!("Ingestion loop stopped");
    }

    /// Open the WebSocket and identify ourselves, all within the connect timeout.
    async fn connect(&self) -> Result<WsStream> {
        let url = self.config.server_url.as_str();
        info!("Connecting to simulation server at {}", url);

        let handshake = async {
            let (mut ws, _response) = connect_async(url)
                .await
                .map_err(|e| ScoreboardError::connect(url, e))?;
            ws.send(Message::text(self.config.client_role.clone()))
                .await
                .map_err(|e| ScoreboardError::connect(url, format!("identification failed: {}", e)))?;
            Ok::<_, ScoreboardError>(ws)
        };

        match tokio::time::timeout(self.config.connect_timeout, handshake).await {
            Ok(result) => {
                if result.is_ok() {
                    info!("Connected to {} as {}", url, self.config.client_role);
                }
                result
            }
            Err(_) => Err(ScoreboardError::connect(
                url,
                format!("handshake timed out after {:?}", self.config.connect_timeout),
            )),
        }
    }

    async fn stream(&self, mut ws: WsStream, shutdown: &mut watch::Receiver<bool>) -> StreamEnd {
        loop {
            let next = tokio::select! {
                _ = shutdown_requested(shutdown) => {
                    if let Err(e) = ws.close(None).await {
                        debug!("Error closing stream on shutdown: {}", e);
                    }
                    return StreamEnd::Shutdown;
                }
                next = ws.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    if let FrameAction::Close = self.handle_frame(message) {
                        return StreamEnd::Closed;
                    }
                }
                Some(Err(e)) => {
                    return StreamEnd::Failed(ScoreboardError::connect(&self.config.server_url, e));
                }
                None => return StreamEnd::Closed,
            }
        }
    }

    fn handle_frame(&self, message: Message) -> FrameAction {
        match message {
            // Failures are already counted and logged; the stream carries on
            Message::Text(text) => {
                if let Err(e) = self.process_message(text.as_str()) {
                    debug!("Skipped text frame: {}", e);
                }
                FrameAction::Continue
            }
            Message::Binary(data) => {
                if let Err(e) = self.process_bytes(&data) {
                    debug!("Skipped binary frame: {}", e);
                }
                FrameAction::Continue
            }
            Message::Close(frame) => {
                info!("Received close frame: {:?}", frame);
                FrameAction::Close
            }
            // Pings are answered by tungstenite itself
            _ => FrameAction::Continue,
        }
    }

    /// Decode, resolve and store one text message.
    pub fn process_message(&self, raw: &str) -> Result<ResolvedSession> {
        self.process_decoded(decode_event(raw))
    }

    /// Same as [`process_message`](Self::process_message) for binary frames.
    pub fn process_bytes(&self, raw: &[u8]) -> Result<ResolvedSession> {
        self.process_decoded(decode_event_bytes(raw))
    }

    fn process_decoded(
        &self,
        decoded: std::result::Result<RoundEvent, DecodeError>,
    ) -> Result<ResolvedSession> {
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);

        let outcome = decoded
            .map_err(ScoreboardError::from)
            .and_then(|event| self.apply_event(&event).map(|resolved| (event, resolved)));

        match outcome {
            Ok((event, resolved)) => {
                self.stats.events_applied.fetch_add(1, Ordering::Relaxed);
                self.stats.records_appended.fetch_add(2, Ordering::Relaxed);
                self.stats
                    .last_event_ms
                    .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
                debug!(
                    "Round {} filed under {} ({:?})",
                    event.round(),
                    resolved.id,
                    resolved.source
                );
                Ok(resolved)
            }
            Err(e) => {
                match &e {
                    ScoreboardError::Decode(_) => {
                        self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                        warn!("Dropping undecodable message: {}", e);
                    }
                    ScoreboardError::UnresolvedSession => {
                        self.stats.unresolved_drops.fetch_add(1, Ordering::Relaxed);
                        warn!("Dropping event: {}", e);
                    }
                    ScoreboardError::StoreContentionTimeout { .. } => {
                        self.stats.store_timeouts.fetch_add(1, Ordering::Relaxed);
                        error!("Dropping round append: {}", e);
                    }
                    ScoreboardError::Connect { .. } => error!("{}", e),
                }
                Err(e)
            }
        }
    }

    fn apply_event(&self, event: &RoundEvent) -> Result<ResolvedSession> {
        let resolved = resolve_session(event, &self.store)?;
        self.store.append_round(&resolved.id, event)?;

        if resolved.source == SessionSource::Explicit && self.store.session_len(&resolved.id) == 2 {
            info!("New session {} started", resolved.id);
        }
        Ok(resolved)
    }
}

/// Resolves once shutdown has been requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `delay`; returns true if shutdown arrived first.
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown_requested(shutdown) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestion() -> IngestionLoop {
        IngestionLoop::new(
            IngestionConfig::default(),
            ReconnectConfig::default(),
            Arc::new(SessionStore::new()),
        )
    }

    fn message(session_id: Option<&str>, round: u32) -> String {
        let mut value = serde_json::json!({
            "Team1": {"player_id": "p1", "move": "C", "score": 3, "round": round},
            "Team2": {"player_id": "p2", "move": "D", "score": 5, "round": round},
        });
        if let Some(id) = session_id {
            value["Session_id"] = serde_json::Value::String(id.to_string());
        }
        value.to_string()
    }

    #[test]
    fn test_example_stream_files_four_records() {
        let ingest = ingestion();
        let first = r#"{"Session_id":"A","Team1":{"player_id":"p1","move":"C","score":3,"round":1},"Team2":{"player_id":"p2","move":"C","score":3,"round":1}}"#;
        let second = r#"{"Team1":{"player_id":"p1","move":"D","score":5,"round":2},"Team2":{"player_id":"p2","move":"C","score":0,"round":2}}"#;

        ingest.process_message(first).unwrap();
        ingest.process_message(second).unwrap();

        let log = ingest.store.snapshot("A");
        let rounds: Vec<u32> = log.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 1, 2, 2]);
        assert_eq!(ingest.store.list_session_ids(), vec!["A"]);
        assert_eq!(log[2].strategy, "D");
        assert_eq!(log[3].score, 0.0);
    }

    #[test]
    fn test_unresolved_event_is_dropped() {
        let ingest = ingestion();
        let err = ingest.process_message(&message(None, 1)).unwrap_err();

        assert!(matches!(err, ScoreboardError::UnresolvedSession));
        assert_eq!(ingest.store.total_records(), 0);
        assert_eq!(ingest.stats().snapshot().unresolved_drops, 1);
    }

    #[test]
    fn test_decode_failure_does_not_stop_processing() {
        let ingest = ingestion();
        assert!(ingest.process_message("not json").is_err());
        ingest.process_message(&message(Some("S1"), 1)).unwrap();

        let stats = ingest.stats().snapshot();
        assert_eq!(stats.messages_received, 2);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.events_applied, 1);
        assert_eq!(stats.records_appended, 2);
        assert!(stats.last_event_at.is_some());
    }

    #[test]
    fn test_records_are_twice_applied_events() {
        let ingest = ingestion();
        let inputs = vec![
            message(None, 1),
            message(Some("S1"), 1),
            message(None, 2),
            "{}".to_string(),
            message(Some("S2"), 1),
            message(None, 2),
            message(Some("S1"), 3),
        ];

        let applied = inputs
            .iter()
            .filter(|raw| ingest.process_message(raw).is_ok())
            .count();

        assert_eq!(applied, 5);
        assert_eq!(ingest.store.total_records(), applied * 2);
        assert_eq!(ingest.store.session_len("S1"), 6);
        assert_eq!(ingest.store.session_len("S2"), 4);
        assert_eq!(ingest.store.list_session_ids(), vec!["S1", "S2"]);
    }

    #[test]
    fn test_empty_session_id_is_filed_like_any_other() {
        let ingest = ingestion();
        let resolved = ingest.process_message(&message(Some(""), 1)).unwrap();
        assert_eq!(resolved.id, "");

        // Id-less events now follow the empty-named session
        ingest.process_message(&message(None, 2)).unwrap();

        assert_eq!(ingest.store.session_len(""), 4);
        assert_eq!(ingest.store.list_session_ids(), vec![""]);
        assert_eq!(ingest.store.current_session().as_deref(), Some(""));
        assert_eq!(ingest.stats().snapshot().decode_failures, 0);
    }

    #[test]
    fn test_binary_frames_are_decoded() {
        let ingest = ingestion();
        ingest.process_bytes(message(Some("S1"), 1).as_bytes()).unwrap();
        assert!(ingest.process_bytes(&[0xc3, 0x28]).is_err());

        assert_eq!(ingest.store.session_len("S1"), 2);
        assert_eq!(ingest.stats().snapshot().decode_failures, 1);
    }

    #[test]
    fn test_close_frame_ends_stream() {
        let ingest = ingestion();
        assert!(matches!(ingest.handle_frame(Message::Close(None)), FrameAction::Close));
        assert!(matches!(
            ingest.handle_frame(Message::Ping(Vec::new().into())),
            FrameAction::Continue
        ));
    }

    #[test]
    fn test_bad_frames_keep_stream_open() {
        let ingest = ingestion();
        assert!(matches!(
            ingest.handle_frame(Message::text("Visualizer".to_string())),
            FrameAction::Continue
        ));
        assert!(matches!(
            ingest.handle_frame(Message::Binary(vec![0xff, 0xfe].into())),
            FrameAction::Continue
        ));
        assert!(matches!(
            ingest.handle_frame(Message::text(message(None, 1))),
            FrameAction::Continue
        ));

        let stats = ingest.stats().snapshot();
        assert_eq!(stats.decode_failures, 2);
        assert_eq!(stats.unresolved_drops, 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let ingest = ingestion();
        let (tx, rx) = watch::channel(true);

        ingest.run(rx).await;
        drop(tx);

        assert_eq!(ingest.state(), IngestionState::Stopped);
        assert_eq!(ingest.reconnect_stats().connect_attempts.load(Ordering::Relaxed), 0);
    }
}
