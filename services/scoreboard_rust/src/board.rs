//! Board rendering: session list, paged round table and per-player totals.

use crate::config::BoardConfig;
use crate::selector::Selection;
use dilemma_core::{RoundRecord, SessionId, SessionStore, SessionSummary};
use std::fmt::Write;

const COLUMNS: [&str; 4] = ["Player ID", "Strategy", "Score", "Round"];

/// Everything one frame shows, captured from the store in one pass.
#[derive(Debug, Clone)]
pub struct BoardView {
    pub title: String,
    pub sessions: Vec<SessionId>,
    pub selected: Option<SessionId>,
    /// True when the selection follows the current-session pointer
    pub following: bool,
    /// Rows of the visible page only
    pub rows: Vec<RoundRecord>,
    /// 1-based
    pub page: usize,
    pub page_count: usize,
    pub total_rows: usize,
    pub summary: SessionSummary,
}

impl BoardView {
    pub fn capture(store: &SessionStore, selection: &Selection, config: &BoardConfig) -> Self {
        let sessions = store.list_session_ids();
        let selected = selection.effective_session(store);
        let records = selected
            .as_deref()
            .map(|id| store.snapshot(id))
            .unwrap_or_default();

        let page_size = config.page_size.max(1);
        let page_count = records.len().div_ceil(page_size).max(1);
        let page = selection.page().unwrap_or(page_count).clamp(1, page_count);

        let start = (page - 1) * page_size;
        let end = (start + page_size).min(records.len());
        let rows = records.get(start..end).map(<[_]>::to_vec).unwrap_or_default();

        Self {
            title: config.title.clone(),
            sessions,
            following: selection.explicit_session().is_none(),
            selected,
            rows,
            page,
            page_count,
            total_rows: records.len(),
            summary: SessionSummary::from_records(&records),
        }
    }
}

/// Format a score without trailing zeros for whole payoffs
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e15 {
        format!("{}", score as i64)
    } else {
        format!("{:.2}", score)
    }
}

pub fn render(view: &BoardView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.title);
    let _ = writeln!(out, "{}", "=".repeat(view.title.chars().count()));

    if view.sessions.is_empty() {
        let _ = writeln!(out, "Waiting for match results...");
        return out;
    }

    // Selector
    let options: Vec<String> = view
        .sessions
        .iter()
        .enumerate()
        .map(|(i, id)| {
            if view.selected.as_deref() == Some(id.as_str()) {
                format!("*[{}] {}*", i + 1, id)
            } else {
                format!("[{}] {}", i + 1, id)
            }
        })
        .collect();
    let _ = writeln!(out, "Sessions: {}", options.join("  "));

    let Some(selected) = &view.selected else {
        let _ = writeln!(out, "Select a session");
        return out;
    };

    let mode = if view.following { " (following live)" } else { "" };
    let _ = writeln!(
        out,
        "Session: {}{}   Page {}/{}   Rows {}",
        selected, mode, view.page, view.page_count, view.total_rows
    );
    let _ = writeln!(out);

    // Table
    let cells: Vec<[String; 4]> = view
        .rows
        .iter()
        .map(|r| {
            [
                r.player_id.clone(),
                r.strategy.clone(),
                format_score(r.score),
                r.round.to_string(),
            ]
        })
        .collect();

    let mut widths = COLUMNS.map(|c| c.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = COLUMNS
        .iter()
        .zip(widths.iter())
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    let _ = writeln!(out, "{}", header.join(" | ").trim_end());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));

    if cells.is_empty() {
        let _ = writeln!(out, "(no rounds yet)");
    }
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(i, (cell, w))| {
                // Numeric columns right-aligned
                if i >= 2 {
                    format!("{:>w$}", cell, w = *w)
                } else {
                    format!("{:<w$}", cell, w = *w)
                }
            })
            .collect();
        let _ = writeln!(out, "{}", line.join(" | ").trim_end());
    }

    // Totals
    if !view.summary.players.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Totals after round {}:",
            view.summary.last_round.unwrap_or(0)
        );
        let leader = view.summary.leader().map(|p| p.player_id.as_str());
        for player in &view.summary.players {
            let marker = if Some(player.player_id.as_str()) == leader { " <- leading" } else { "" };
            let _ = writeln!(
                out,
                "  {}: {} over {} rounds, cooperated {:.0}%{}",
                player.player_id,
                format_score(player.total_score),
                player.rounds_played,
                player.cooperation_rate() * 100.0,
                marker
            );
        }
    }

    out
}
