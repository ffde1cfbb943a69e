//! Error types for the match authority.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{PlayerId, UnitId};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for data, configuration and state failures.
#[derive(Debug, Error)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Match or unit configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A connection tried to join a room whose slots are all claimed.
    #[error("Room is full ({max_players} players), rejecting player {player}")]
    RoomFull {
        /// Player that was turned away.
        player: PlayerId,
        /// Configured player limit.
        max_players: u8,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Replay verification failed.
    #[error("Desync detected at tick {tick}: expected hash {expected}, got {actual}")]
    DesyncDetected {
        /// Tick where the mismatch was found.
        tick: u64,
        /// Hash recorded in the replay.
        expected: u64,
        /// Hash produced on playback.
        actual: u64,
    },
}

/// Why the authority refused a player command.
///
/// A rejected command never mutates state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandError {
    /// Sender is not the player whose turn it is.
    #[error("not your turn (current: {current:?})")]
    NotYourTurn {
        /// Player currently holding the turn, if any.
        current: Option<PlayerId>,
    },
    /// The turn's action budget is spent.
    #[error("no actions remaining")]
    NoActionsRemaining,
    /// Referenced unit does not exist or is already destroyed.
    #[error("unit {unit} not found")]
    UnitNotFound {
        /// Missing unit.
        unit: UnitId,
    },
    /// Sender does not own the unit it tried to command.
    #[error("unit {unit} is not owned by player {player}")]
    NotOwner {
        /// Commanded unit.
        unit: UnitId,
        /// Player that sent the command.
        player: PlayerId,
    },
    /// Attack target is one of the sender's own units.
    #[error("unit {target} is friendly")]
    FriendlyTarget {
        /// Rejected target.
        target: UnitId,
    },
    /// Attack target has no hit points left.
    #[error("target {target} is already dead")]
    TargetDead {
        /// Rejected target.
        target: UnitId,
    },
    /// The match has already been decided.
    #[error("match is over")]
    MatchOver,
}
