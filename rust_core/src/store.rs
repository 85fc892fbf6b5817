//! In-memory, session-partitioned log of rounds.
//!
//! The store owns both the per-session logs and the current-session pointer
//! behind a single `parking_lot::RwLock`. Writers (the ingestion loop) take
//! the lock with a bounded wait; readers (the board) copy what they need and
//! release it.
//!
//! Sessions are never evicted, so memory grows with the number of rounds
//! received for the lifetime of the process.

use crate::error::{Result, ScoreboardError};
use crate::models::{RoundEvent, RoundRecord, SessionId};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::HashMap;
use std::time::Duration;

/// Default budget for acquiring the write lock
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
struct StoreInner {
    logs: HashMap<SessionId, Vec<RoundRecord>>,
    /// Session ids in first-created order
    order: Vec<SessionId>,
    current: Option<SessionId>,
}

impl StoreInner {
    fn log_mut(&mut self, id: &str) -> &mut Vec<RoundRecord> {
        if !self.logs.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.logs.entry(id.to_string()).or_default()
    }
}

/// Thread-safe mapping from session id to its ordered round log.
#[derive(Debug)]
pub struct SessionStore {
    inner: RwLock<StoreInner>,
    write_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_write_timeout(DEFAULT_WRITE_TIMEOUT)
    }

    pub fn with_write_timeout(write_timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            write_timeout,
        }
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreInner>> {
        self.inner
            .try_write_for(self.write_timeout)
            .ok_or(ScoreboardError::StoreContentionTimeout {
                waited: self.write_timeout,
            })
    }

    /// Create an empty log for `id` if it does not exist yet.
    /// Returns true when the session was created by this call.
    pub fn ensure_session(&self, id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.logs.contains_key(id) {
            return Ok(false);
        }
        inner.log_mut(id);
        Ok(true)
    }

    /// Append one record, creating the session if absent.
    pub fn append(&self, id: &str, record: RoundRecord) -> Result<()> {
        let mut inner = self.write()?;
        inner.log_mut(id).push(record);
        Ok(())
    }

    /// Append both team records of an event under one lock acquisition,
    /// so readers see either none or both of them.
    pub fn append_round(&self, id: &str, event: &RoundEvent) -> Result<()> {
        let records = event.records();
        let mut inner = self.write()?;
        inner.log_mut(id).extend(records);
        Ok(())
    }

    /// Known session ids in the order they were first created.
    pub fn list_session_ids(&self) -> Vec<SessionId> {
        self.inner.read().order.clone()
    }

    /// Copy of a session's log; empty when the id is unknown.
    pub fn snapshot(&self, id: &str) -> Vec<RoundRecord> {
        self.inner
            .read()
            .logs
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Last session id seen explicitly on the wire.
    pub fn current_session(&self) -> Option<SessionId> {
        self.inner.read().current.clone()
    }

    /// Move the current-session pointer. Returns the previous value.
    pub fn set_current_session(&self, id: &str) -> Result<Option<SessionId>> {
        let mut inner = self.write()?;
        if inner.current.as_deref() == Some(id) {
            return Ok(inner.current.clone());
        }
        Ok(inner.current.replace(id.to_string()))
    }

    pub fn session_len(&self, id: &str) -> usize {
        self.inner.read().logs.get(id).map_or(0, Vec::len)
    }

    pub fn session_count(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn total_records(&self) -> usize {
        self.inner.read().logs.values().map(Vec::len).sum()
    }
}
