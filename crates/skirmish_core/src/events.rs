//! Events emitted by the authority.
//!
//! Everything observable that happens to a match is reported as a
//! [`MatchEvent`]. The server broadcasts them verbatim; the headless runner
//! prints them. Nothing reads them back into the simulation.

use serde::{Deserialize, Serialize};

use crate::components::{PlayerId, UnitId};
use crate::error::CommandError;
use crate::math::Vec2Fixed;

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEndReason {
    /// The time budget ran out.
    TimeExpired,
    /// The action budget ran out.
    ActionsExhausted,
    /// The current player asked to end the turn.
    Requested,
    /// The current player left, or too few players remain.
    PlayerLeft,
}

/// Something observable that happened during a tick or a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchEvent {
    /// A player claimed (or reclaimed) a slot.
    PlayerJoined {
        /// Joining player.
        player: PlayerId,
        /// Slot index, also the spawn layout index.
        slot: usize,
    },
    /// A player disconnected.
    PlayerLeft {
        /// Departing player.
        player: PlayerId,
    },
    /// A unit entered the field.
    UnitSpawned {
        /// New unit.
        unit: UnitId,
        /// Controlling player.
        owner: PlayerId,
        /// Unit type identifier.
        kind: String,
        /// Spawn position.
        position: Vec2Fixed,
    },
    /// A new turn began.
    TurnStarted {
        /// Player holding the turn.
        player: PlayerId,
        /// 1-based turn counter.
        turn_number: u32,
        /// Fresh action budget.
        actions: u32,
        /// Fresh time budget in ticks.
        time_ticks: u32,
    },
    /// The current player spent an action.
    ActionUsed {
        /// Player who acted.
        player: PlayerId,
        /// Actions left this turn.
        remaining: u32,
    },
    /// A turn finished.
    TurnEnded {
        /// Player whose turn ended.
        player: PlayerId,
        /// Turn counter of the finished turn.
        turn_number: u32,
        /// What ended it.
        reason: TurnEndReason,
    },
    /// Not enough players are connected to continue.
    WaitingForPlayers {
        /// Connected players.
        connected: usize,
        /// Players required.
        required: u8,
    },
    /// A command was refused.
    CommandRejected {
        /// Player that sent it.
        player: PlayerId,
        /// Command name.
        command: String,
        /// Refusal reason.
        reason: CommandError,
    },
    /// A unit received a move order.
    MoveOrdered {
        /// Ordered unit.
        unit: UnitId,
        /// Destination after clamping.
        destination: Vec2Fixed,
    },
    /// A unit locked onto an enemy.
    TargetAcquired {
        /// Attacking unit.
        unit: UnitId,
        /// Its target.
        target: UnitId,
    },
    /// A unit dropped its target.
    TargetCleared {
        /// Unit that lost its target.
        unit: UnitId,
        /// The target it had.
        target: UnitId,
    },
    /// One shot landed.
    Damage {
        /// Unit that fired.
        attacker: UnitId,
        /// Unit that was hit.
        target: UnitId,
        /// Hit points removed.
        amount: u32,
        /// Owner of the attacker.
        instigator: PlayerId,
        /// Target's hit points after the hit.
        remaining_hp: u32,
    },
    /// A unit reached zero hit points and left the field.
    UnitDestroyed {
        /// Removed unit.
        unit: UnitId,
        /// Its owner.
        owner: PlayerId,
    },
    /// The turn cap was reached with even forces; movement limits are lifted.
    SpeedUnlocked {
        /// Turn at which the stalemate was detected.
        turn_number: u32,
    },
    /// The match is decided.
    MatchEnded {
        /// Winning player, `None` on mutual destruction.
        winner: Option<PlayerId>,
        /// Turn at which it ended.
        turn_number: u32,
    },
}

impl MatchEvent {
    /// Short event name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::UnitSpawned { .. } => "unit_spawned",
            Self::TurnStarted { .. } => "turn_started",
            Self::ActionUsed { .. } => "action_used",
            Self::TurnEnded { .. } => "turn_ended",
            Self::WaitingForPlayers { .. } => "waiting_for_players",
            Self::CommandRejected { .. } => "command_rejected",
            Self::MoveOrdered { .. } => "move_ordered",
            Self::TargetAcquired { .. } => "target_acquired",
            Self::TargetCleared { .. } => "target_cleared",
            Self::Damage { .. } => "damage",
            Self::UnitDestroyed { .. } => "unit_destroyed",
            Self::SpeedUnlocked { .. } => "speed_unlocked",
            Self::MatchEnded { .. } => "match_ended",
        }
    }
}
