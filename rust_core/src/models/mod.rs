// Shared models for the Prisoner's Dilemma scoreboard
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque identifier of one simulation run between two players.
pub type SessionId = String;

// ============================================================================
// Round Results
// ============================================================================

/// One player's result for one round, as stored in a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub player_id: String,
    /// The move played this round ("C"/"D" or a strategy-specific label)
    #[serde(rename = "move")]
    pub strategy: String,
    /// Payoff for the round; zero and negative payoffs are legal
    pub score: f64,
    pub round: u32,
}

impl RoundRecord {
    pub fn new(player_id: &str, strategy: &str, score: f64, round: u32) -> Self {
        Self {
            player_id: player_id.to_string(),
            strategy: strategy.to_string(),
            score,
            round,
        }
    }

    /// Whether the move reads as cooperation ("C", "cooperate", ...).
    pub fn is_cooperation(&self) -> bool {
        let strategy = self.strategy.trim();
        strategy.eq_ignore_ascii_case("c")
            || strategy.to_ascii_lowercase().starts_with("coop")
    }
}

/// A decoded match result covering both teams of one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundEvent {
    /// Explicit session id, when the server sent one
    pub session_id: Option<SessionId>,
    pub team1: RoundRecord,
    pub team2: RoundRecord,
}

impl RoundEvent {
    /// Round number the event is filed under. Team1's value wins for both records.
    pub fn round(&self) -> u32 {
        self.team1.round
    }

    /// The two records this event contributes, Team1 first.
    pub fn records(&self) -> [RoundRecord; 2] {
        let round = self.round();
        let mut team2 = self.team2.clone();
        team2.round = round;
        [self.team1.clone(), team2]
    }
}

// ============================================================================
// Session Summary
// ============================================================================

/// Running totals for one player within a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerTotals {
    pub player_id: String,
    pub total_score: f64,
    pub rounds_played: usize,
    pub cooperations: usize,
}

impl PlayerTotals {
    pub fn cooperation_rate(&self) -> f64 {
        if self.rounds_played == 0 {
            return 0.0;
        }
        self.cooperations as f64 / self.rounds_played as f64
    }
}

/// Per-player totals for a session log, players in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub players: Vec<PlayerTotals>,
    pub last_round: Option<u32>,
}

impl SessionSummary {
    pub fn from_records(records: &[RoundRecord]) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut players: Vec<PlayerTotals> = Vec::new();
        let mut last_round = None;

        for record in records {
            let slot = *index.entry(record.player_id.as_str()).or_insert_with(|| {
                players.push(PlayerTotals {
                    player_id: record.player_id.clone(),
                    total_score: 0.0,
                    rounds_played: 0,
                    cooperations: 0,
                });
                players.len() - 1
            });

            let totals = &mut players[slot];
            totals.total_score += record.score;
            totals.rounds_played += 1;
            if record.is_cooperation() {
                totals.cooperations += 1;
            }

            last_round = Some(last_round.map_or(record.round, |r: u32| r.max(record.round)));
        }

        Self {
            players,
            last_round,
        }
    }

    /// Player with the highest cumulative score, if any records exist.
    pub fn leader(&self) -> Option<&PlayerTotals> {
        self.players
            .iter()
            .max_by(|a, b| a.total_score.total_cmp(&b.total_score))
    }
}
