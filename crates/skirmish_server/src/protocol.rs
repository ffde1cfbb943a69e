//! JSON-lines wire protocol between clients and the host.
//!
//! Every message is one JSON object on its own line. Clients never name
//! themselves: the host knows who sent a line from the connection it
//! arrived on.
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"welcome","player_id":1,"tick":0}
//! <- {"type":"event","event":{"event":"player_joined","player":1,"slot":0}}
//! -> {"cmd":"move","unit":1,"x":-30.0,"y":0.0}
//! <- {"type":"event","event":{"event":"action_used","player":1,"remaining":1}}
//! -> {"cmd":"end_turn"}
//! -> {"cmd":"query"}
//! <- {"type":"state","snapshot":{"tick":42,...}}
//! ```

use serde::{Deserialize, Serialize};
use skirmish_core::components::{PlayerId, UnitCommand, UnitId};
use skirmish_core::error::CommandError;
use skirmish_core::events::MatchEvent;
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::simulation::MatchSnapshot;

// ============================================================================
// Client -> Host
// ============================================================================

/// A line sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Move a unit toward a ground point.
    Move {
        /// Unit to move.
        unit: UnitId,
        /// Destination x.
        x: f64,
        /// Destination y.
        y: f64,
    },
    /// Attack an enemy unit.
    Attack {
        /// Attacking unit.
        unit: UnitId,
        /// Enemy unit.
        target: UnitId,
    },
    /// Pass the turn.
    EndTurn,
    /// Ask for a full snapshot.
    Query,
}

impl ClientMessage {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Command name used in replies.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::EndTurn => "end_turn",
            Self::Query => "query",
        }
    }

    /// The authority command this message carries, if any.
    ///
    /// Coordinates outside the fixed-point range yield `Err` with a
    /// description.
    pub fn to_command(&self) -> Result<Option<UnitCommand>, String> {
        Ok(match *self {
            Self::Move { unit, x, y } => {
                let destination = to_ground_point(x, y)?;
                Some(UnitCommand::Move { unit, destination })
            }
            Self::Attack { unit, target } => Some(UnitCommand::Attack { unit, target }),
            Self::EndTurn => Some(UnitCommand::EndTurn),
            Self::Query => None,
        })
    }
}

/// Convert wire coordinates into a fixed-point ground point.
pub fn to_ground_point(x: f64, y: f64) -> Result<Vec2Fixed, String> {
    let convert = |v: f64| {
        Fixed::checked_from_num(v).ok_or_else(|| format!("coordinate {v} is out of range"))
    };
    Ok(Vec2Fixed::new(convert(x)?, convert(y)?))
}

// ============================================================================
// Host -> Client
// ============================================================================

/// A line sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after a slot is granted.
    Welcome {
        /// Id the host assigned to this connection.
        player_id: PlayerId,
        /// Tick at the time of joining.
        tick: u64,
    },
    /// A match event, broadcast to every client.
    Event {
        /// The event.
        event: MatchEvent,
    },
    /// Reply to `query`.
    State {
        /// Full public state.
        snapshot: MatchSnapshot,
    },
    /// A command was refused. Only the sender receives this.
    Rejected {
        /// Name of the refused command.
        cmd: String,
        /// Why it was refused.
        reason: CommandError,
    },
    /// Malformed input.
    Error {
        /// Description.
        message: String,
    },
    /// Every slot is taken; the host closes the connection after this.
    RoomFull,
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to a JSON line (with newline).
    #[must_use]
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
