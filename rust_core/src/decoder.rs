//! Wire decoding for match results streamed by the simulation server.
//!
//! Expected shape:
//! ```json
//! {
//!   "Session_id": "optional string",
//!   "Team1": {"player_id": "p1", "move": "C", "score": 3, "round": 1},
//!   "Team2": {"player_id": "p2", "move": "D", "score": 5, "round": 1}
//! }
//! ```
//! Unknown fields are ignored. Nothing is repaired: a missing team or
//! subfield rejects the whole message.

use crate::error::DecodeError;
use crate::models::{RoundEvent, RoundRecord, SessionId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "Session_id", default)]
    session_id: Option<SessionId>,
    #[serde(rename = "Team1")]
    team1: RoundRecord,
    #[serde(rename = "Team2")]
    team2: RoundRecord,
}

/// Decode one text message into a round event.
pub fn decode_event(raw: &str) -> Result<RoundEvent, DecodeError> {
    let wire: WireEvent = serde_json::from_str(raw)?;

    check_round("Team1", &wire.team1)?;
    check_round("Team2", &wire.team2)?;

    // Ids are opaque; a null Session_id reads the same as an absent one
    Ok(RoundEvent {
        session_id: wire.session_id,
        team1: wire.team1,
        team2: wire.team2,
    })
}

/// Decode a binary frame, which must carry UTF-8 JSON.
pub fn decode_event_bytes(raw: &[u8]) -> Result<RoundEvent, DecodeError> {
    let text = std::str::from_utf8(raw)?;
    decode_event(text)
}

fn check_round(team: &'static str, record: &RoundRecord) -> Result<(), DecodeError> {
    if record.round == 0 {
        return Err(DecodeError::InvalidRound {
            team,
            round: record.round,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "Session_id": "A",
        "Team1": {"player_id": "p1", "move": "C", "score": 3, "round": 1},
        "Team2": {"player_id": "p2", "move": "D", "score": -1.5, "round": 1}
    }"#;

    #[test]
    fn test_decode_full_event() {
        let event = decode_event(FULL).unwrap();
        assert_eq!(event.session_id.as_deref(), Some("A"));
        assert_eq!(event.team1.player_id, "p1");
        assert_eq!(event.team1.strategy, "C");
        assert_eq!(event.team1.score, 3.0);
        assert_eq!(event.team2.score, -1.5);
        assert_eq!(event.round(), 1);
    }

    #[test]
    fn test_decode_without_session_id() {
        let raw = r#"{"Team1": {"player_id": "p1", "move": "D", "score": 5, "round": 2},
                      "Team2": {"player_id": "p2", "move": "C", "score": 0, "round": 2}}"#;
        let event = decode_event(raw).unwrap();
        assert!(event.session_id.is_none());
        assert_eq!(event.team2.score, 0.0);
    }

    #[test]
    fn test_null_session_id_is_absent() {
        let raw = r#"{"Session_id": null,
                      "Team1": {"player_id": "p1", "move": "D", "score": 5, "round": 2},
                      "Team2": {"player_id": "p2", "move": "C", "score": 0, "round": 2}}"#;
        assert!(decode_event(raw).unwrap().session_id.is_none());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let raw = r#"{"Session_id": "A", "extra": [1, 2],
                      "Team1": {"player_id": "p1", "move": "C", "score": 3, "round": 1, "elapsed": 0.2},
                      "Team2": {"player_id": "p2", "move": "C", "score": 3, "round": 1}}"#;
        assert!(decode_event(raw).is_ok());
    }

    #[test]
    fn test_missing_team_is_rejected() {
        let raw = r#"{"Session_id": "A",
                      "Team1": {"player_id": "p1", "move": "C", "score": 3, "round": 1}}"#;
        let err = decode_event(raw).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
        assert!(err.to_string().contains("Team2"));
    }

    #[test]
    fn test_missing_subfield_is_rejected() {
        let raw = r#"{"Team1": {"player_id": "p1", "score": 3, "round": 1},
                      "Team2": {"player_id": "p2", "move": "C", "score": 3, "round": 1}}"#;
        let err = decode_event(raw).unwrap_err();
        assert!(err.to_string().contains("move"));
    }

    #[test]
    fn test_non_numeric_score_is_rejected() {
        let raw = r#"{"Team1": {"player_id": "p1", "move": "C", "score": "three", "round": 1},
                      "Team2": {"player_id": "p2", "move": "C", "score": 3, "round": 1}}"#;
        assert!(matches!(decode_event(raw), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_bad_round_is_rejected() {
        let fractional = r#"{"Team1": {"player_id": "p1", "move": "C", "score": 3, "round": 1.5},
                             "Team2": {"player_id": "p2", "move": "C", "score": 3, "round": 1}}"#;
        assert!(matches!(decode_event(fractional), Err(DecodeError::Json(_))));

        let negative = r#"{"Team1": {"player_id": "p1", "move": "C", "score": 3, "round": 1},
                           "Team2": {"player_id": "p2", "move": "C", "score": 3, "round": -2}}"#;
        assert!(matches!(decode_event(negative), Err(DecodeError::Json(_))));

        let zero = r#"{"Team1": {"player_id": "p1", "move": "C", "score": 3, "round": 0},
                       "Team2": {"player_id": "p2", "move": "C", "score": 3, "round": 1}}"#;
        assert!(matches!(
            decode_event(zero),
            Err(DecodeError::InvalidRound { team: "Team1", round: 0 })
        ));
    }

    #[test]
    fn test_empty_session_id_is_kept_verbatim() {
        let raw = r#"{"Session_id": "",
                      "Team1": {"player_id": "p1", "move": "C", "score": 3, "round": 1},
                      "Team2": {"player_id": "p2", "move": "C", "score": 3, "round": 1}}"#;
        assert_eq!(decode_event(raw).unwrap().session_id.as_deref(), Some(""));

        let spaces = raw.replace(r#""Session_id": """#, r#""Session_id": "  ""#);
        assert_eq!(decode_event(&spaces).unwrap().session_id.as_deref(), Some("  "));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode_event("Visualizer").is_err());
        assert!(decode_event("[1, 2, 3]").is_err());
        assert!(decode_event("").is_err());
    }

    #[test]
    fn test_decode_bytes() {
        assert!(decode_event_bytes(FULL.as_bytes()).is_ok());
        assert!(matches!(
            decode_event_bytes(&[0xff, 0xfe, 0x00]),
            Err(DecodeError::NotUtf8(_))
        ));
    }
}
