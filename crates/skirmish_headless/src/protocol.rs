//! JSON protocol for headless match control.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the AI controller
//! **Output (stdout):** Match updates and responses
//!
//! Unlike the network host, the controller plays every seat, so each
//! connection and unit command names the player it acts for.
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller connects players and sends commands as JSON lines
//! 3. Runner outputs the events each command or tick produced
//! 4. When the match is decided, outputs `{"type":"game_over",...}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"connect","player":1}
//! <- {"type":"events","tick":0,"events":[{"event":"player_joined","player":1,"slot":0},...]}
//! -> {"cmd":"connect","player":2}
//! <- {"type":"events","tick":0,"events":[...,{"event":"turn_started","player":1,...}]}
//! -> {"cmd":"attack","player":1,"unit":1,"target":6}
//! <- {"type":"ack","cmd":"attack"}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"events","tick":60,"events":[...]}
//! -> {"cmd":"hash"}
//! <- {"type":"state_hash","tick":60,"hash":1234567890}
//! ```

use serde::{Deserialize, Serialize};
use skirmish_core::components::{PlayerId, UnitId};
use skirmish_core::error::CommandError;
use skirmish_core::events::MatchEvent;
use skirmish_core::simulation::MatchSnapshot;

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (AI -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Seat a player.
    Connect { player: PlayerId },

    /// Drop a player's connection.
    Disconnect { player: PlayerId },

    /// Advance simulation by N ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Move a unit toward a ground point.
    Move {
        player: PlayerId,
        unit: UnitId,
        x: f64,
        y: f64,
    },

    /// Order a unit to attack an enemy.
    Attack {
        player: PlayerId,
        unit: UnitId,
        target: UnitId,
    },

    /// Pass the turn.
    EndTurn { player: PlayerId },

    /// Query current match state without advancing time.
    Query,

    /// Report the state hash (for determinism verification).
    Hash,

    /// Quit the runner.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> AI)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready { version: String, tick: u64 },

    /// A unit command was accepted.
    Ack { cmd: String },

    /// A unit command was refused by the authority.
    Rejected { cmd: String, reason: CommandError },

    /// Error processing a command.
    Error {
        message: String,
        cmd: Option<String>,
    },

    /// Events produced by the last command or ticks.
    Events { tick: u64, events: Vec<MatchEvent> },

    /// Current match state.
    State { snapshot: MatchSnapshot, hash: u64 },

    /// State hash for determinism verification.
    StateHash { tick: u64, hash: u64 },

    /// The match has been decided.
    GameOver {
        winner: Option<PlayerId>,
        tick: u64,
        turn_number: u32,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }

    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::Tick { .. } => "tick",
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::EndTurn { .. } => "end_turn",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_command() {
        let json = r#"{"cmd":"tick","count":60}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 60 }));
    }

    #[test]
    fn test_default_tick_count() {
        let json = r#"{"cmd":"tick"}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 1 }));
    }

    #[test]
    fn test_parse_move_command() {
        let json = r#"{"cmd":"move","player":2,"unit":7,"x":10.5,"y":-3}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(
            cmd,
            Command::Move {
                player: 2,
                unit: 7,
                x: 10.5,
                y: -3.0
            }
        );
        assert_eq!(cmd.name(), "move");
    }

    #[test]
    fn test_unit_command_requires_player() {
        assert!(Command::from_json(r#"{"cmd":"end_turn"}"#).is_err());
        assert!(Command::from_json(r#"{"cmd":"end_turn","player":1}"#).is_ok());
    }

    #[test]
    fn test_serialize_rejected_response() {
        let resp = Response::Rejected {
            cmd: "attack".to_string(),
            reason: CommandError::FriendlyTarget { target: 2 },
        };
        let json = resp.to_json_line();
        assert!(json.contains(r#""type":"rejected""#));
        assert!(json.contains(r#""kind":"friendly_target""#));
        assert_eq!(Response::from_json(json.trim()).unwrap(), resp);
    }

    #[test]
    fn test_serialize_game_over_draw() {
        let json = Response::GameOver {
            winner: None,
            tick: 400,
            turn_number: 20,
        }
        .to_json_line();
        assert_eq!(
            json,
            "{\"type\":\"game_over\",\"winner\":null,\"tick\":400,\"turn_number\":20}\n"
        );
    }
}
