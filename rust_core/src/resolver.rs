//! Session resolution for incoming round events.
//!
//! An explicit `Session_id` always wins and becomes the new current session.
//! Events without one are filed under the current session; if no session has
//! been seen yet the event cannot be placed.

use crate::error::{Result, ScoreboardError};
use crate::models::{RoundEvent, SessionId};
use crate::store::SessionStore;
use tracing::info;

/// Where a resolved session id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// Named on the event itself
    Explicit,
    /// Taken from the current-session pointer
    Inferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub id: SessionId,
    pub source: SessionSource,
}

/// Pick the session an event belongs to, advancing the current-session
/// pointer when the event names one.
pub fn resolve_session(event: &RoundEvent, store: &SessionStore) -> Result<ResolvedSession> {
    if let Some(id) = &event.session_id {
        let previous = store.set_current_session(id)?;
        if previous.as_deref() != Some(id.as_str()) {
            info!(
                "Current session is now {} (was {})",
                id,
                previous.as_deref().unwrap_or("unset")
            );
        }
        return Ok(ResolvedSession {
            id: id.clone(),
            source: SessionSource::Explicit,
        });
    }

    store
        .current_session()
        .map(|id| ResolvedSession {
            id,
            source: SessionSource::Inferred,
        })
        .ok_or(ScoreboardError::UnresolvedSession)
}
