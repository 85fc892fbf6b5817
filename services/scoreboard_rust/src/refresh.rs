//! Periodic board refresh.
//!
//! Redraws on every tick and immediately after a selector change. Only reads
//! from the store; never touches ingestion state.

use crate::board::{render, BoardView};
use crate::config::BoardConfig;
use crate::selector::{Command, Selection};
use dilemma_core::SessionStore;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub struct PresentationAdapter<W: Write> {
    store: Arc<SessionStore>,
    config: BoardConfig,
    selection: Selection,
    out: W,
    frames: u64,
}

impl<W: Write> PresentationAdapter<W> {
    pub fn new(store: Arc<SessionStore>, config: BoardConfig, out: W) -> Self {
        Self {
            store,
            config,
            selection: Selection::default(),
            out,
            frames: 0,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Snapshot the store and write one frame.
    pub fn render_frame(&mut self) -> std::io::Result<()> {
        let view = BoardView::capture(&self.store, &self.selection, &self.config);
        if self.config.clear_screen {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        self.out.write_all(render(&view).as_bytes())?;
        self.out.flush()?;
        self.frames += 1;
        Ok(())
    }

    /// Apply a selector command, redrawing if it changed the view.
    pub fn handle_command(&mut self, command: &Command) {
        if self.selection.apply(command, &self.store) {
            self.draw();
        }
    }

    fn draw(&mut self) {
        if let Err(e) = self.render_frame() {
            warn!("Failed to render board: {}", e);
        }
    }

    /// Refresh until shutdown. A closed command channel only stops selector input.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        info!(
            "Board refresh started (interval: {:?}, page size: {})",
            self.config.refresh_interval, self.config.page_size
        );

        let mut interval = tokio::time::interval(self.config.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut commands_open = true;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => self.draw(),
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(&command),
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Board refresh stopped after {} frames", self.frames);
        self
    }
}
