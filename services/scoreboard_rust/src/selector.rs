//! Session selector: which session and page the board shows.
//!
//! Options come from `SessionStore::list_session_ids()` on every use, so the
//! selector never holds its own copy of the session list.

use dilemma_core::{SessionId, SessionStore};
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// A user request read from the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 1-based position in the session list (`#3`)
    SelectIndex(usize),
    /// Session id, or a bare number read as a position when no id matches
    SelectSession(SessionId),
    /// Drop the explicit selection and follow the current session
    Follow,
    /// 1-based page number
    Page(usize),
    /// Unpin the page and show the newest rows
    Live,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let mut parts = line.split_whitespace();
        let head = parts.next()?;
        let arg = parts.next();

        match (head.to_lowercase().as_str(), arg) {
            ("q" | "quit" | "exit", None) => Some(Command::Quit),
            ("auto" | "follow", None) => Some(Command::Follow),
            ("live" | "tail", None) => Some(Command::Live),
            ("p" | "page", Some(n)) => n.parse().ok().filter(|n| *n > 0).map(Command::Page),
            _ => match line.strip_prefix('#').map(str::parse::<usize>) {
                Some(Ok(n)) if n > 0 => Some(Command::SelectIndex(n)),
                _ => Some(Command::SelectSession(line.to_string())),
            },
        }
    }
}

/// Current selector state. Nothing selected means "follow the session the
/// server is currently streaming".
#[derive(Debug, Clone, Default)]
pub struct Selection {
    explicit: Option<SessionId>,
    page: Option<usize>,
}

impl Selection {
    /// Session to display: the explicit pick, else the current-session pointer.
    pub fn effective_session(&self, store: &SessionStore) -> Option<SessionId> {
        self.explicit.clone().or_else(|| store.current_session())
    }

    pub fn explicit_session(&self) -> Option<&str> {
        self.explicit.as_deref()
    }

    /// Pinned 1-based page, or `None` to follow the newest rows.
    pub fn page(&self) -> Option<usize> {
        self.page
    }

    /// Apply a command. Returns true when the view should be redrawn.
    pub fn apply(&mut self, command: &Command, store: &SessionStore) -> bool {
        match command {
            Command::SelectIndex(n) => self.select_index(*n, &store.list_session_ids()),
            Command::SelectSession(id) => {
                let sessions = store.list_session_ids();
                if sessions.iter().any(|known| known == id) {
                    return self.select(id.clone());
                }
                match id.parse::<usize>() {
                    Ok(n) => self.select_index(n, &sessions),
                    Err(_) => {
                        warn!("Unknown session {}", id);
                        false
                    }
                }
            }
            Command::Follow => {
                self.page = None;
                self.explicit.take().is_some()
            }
            Command::Page(n) => self.page.replace(*n) != Some(*n),
            Command::Live => self.page.take().is_some(),
            Command::Quit => false,
        }
    }

    fn select_index(&mut self, n: usize, sessions: &[SessionId]) -> bool {
        match n.checked_sub(1).and_then(|i| sessions.get(i)) {
            Some(id) => self.select(id.clone()),
            None => {
                warn!("No session #{} ({} known)", n, sessions.len());
                false
            }
        }
    }

    fn select(&mut self, id: SessionId) -> bool {
        if self.explicit.as_deref() == Some(id.as_str()) {
            return false;
        }
        info!("Selected session {}", id);
        self.explicit = Some(id);
        self.page = None;
        true
    }
}

/// Read commands from stdin on a plain thread; a blocking stdin read would
/// otherwise hold up runtime shutdown. `q` requests shutdown directly.
pub fn spawn_stdin_reader(commands: mpsc::Sender<Command>, shutdown: Arc<watch::Sender<bool>>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match Command::parse(&line) {
                Some(Command::Quit) => {
                    info!("Quit requested");
                    let _ = shutdown.send(true);
                    break;
                }
                Some(command) => {
                    if commands.blocking_send(command).is_err() {
                        break;
                    }
                }
                None => {}
            }
        }
    });
}
