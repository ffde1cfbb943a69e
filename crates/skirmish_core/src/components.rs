//! Unit component definitions.
//!
//! Components are pure data with no behavior beyond small accessors.
//! Every unit on the field is composed of these, and only the authority
//! ever writes them.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::simulation::TICK_RATE;

/// Unique identifier for units. Assigned by the authority, never reused.
pub type UnitId = u64;

/// Connection identifier of a player.
pub type PlayerId = u64;

/// Position component in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// World position.
    pub value: Vec2Fixed,
}

impl Position {
    /// Create a new position at the given coordinates.
    #[must_use]
    pub const fn new(value: Vec2Fixed) -> Self {
        Self { value }
    }
}

/// Ownership component linking a unit to the connection that controls it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    /// Controlling player.
    pub player: PlayerId,
}

impl Owner {
    /// Create an ownership component.
    #[must_use]
    pub const fn new(player: PlayerId) -> Self {
        Self { player }
    }

    /// Whether `player` controls this unit.
    #[must_use]
    pub const fn is(&self, player: PlayerId) -> bool {
        self.player == player
    }
}

/// Movement component for mobile units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Movement speed in world units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Where the unit is heading, if anywhere.
    pub destination: Option<Vec2Fixed>,
}

impl Movement {
    /// Create a stationary movement component.
    #[must_use]
    pub const fn new(speed: Fixed) -> Self {
        Self {
            speed,
            destination: None,
        }
    }

    /// Distance covered in one simulation tick.
    #[must_use]
    pub fn step_per_tick(&self) -> Fixed {
        self.speed / Fixed::from_num(TICK_RATE)
    }

    /// Halt in place.
    pub fn stop(&mut self) {
        self.destination = None;
    }

    /// Check if the unit has somewhere to go.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.destination.is_some()
    }
}

/// Health component for damageable units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if the unit is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction to prevent underflow.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current = self.current.saturating_sub(actual);
        actual
    }
}

/// Combat stats component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    /// Damage dealt per shot.
    pub damage: u32,
    /// Attack range in world units.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Minimum ticks between two shots.
    pub cooldown_ticks: u32,
    /// Tick of the last shot fired.
    pub last_attack_tick: Option<u64>,
}

impl CombatStats {
    /// Create combat stats that are ready to fire.
    #[must_use]
    pub const fn new(damage: u32, range: Fixed, cooldown_ticks: u32) -> Self {
        Self {
            damage,
            range,
            cooldown_ticks,
            last_attack_tick: None,
        }
    }

    /// Whether the weapon has recovered by `tick`.
    ///
    /// A unit that has never fired is always ready.
    #[must_use]
    pub fn can_fire(&self, tick: u64) -> bool {
        match self.last_attack_tick {
            None => true,
            Some(last) => tick.saturating_sub(last) >= u64::from(self.cooldown_ticks),
        }
    }

    /// Mark a shot fired at `tick`.
    pub fn record_shot(&mut self, tick: u64) {
        self.last_attack_tick = Some(tick);
    }
}

/// Component for tracking the current attack target.
///
/// A unit holds at most one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttackTarget {
    /// The unit being targeted for attack.
    pub target: Option<UnitId>,
}

impl AttackTarget {
    /// Create with a specific target.
    #[must_use]
    pub const fn with_target(target: UnitId) -> Self {
        Self {
            target: Some(target),
        }
    }

    /// Clear the current target, returning what was cleared.
    pub fn clear(&mut self) -> Option<UnitId> {
        self.target.take()
    }
}

/// A player-initiated command, as received by the authority.
///
/// The sender is never part of the command; it comes from the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitCommand {
    /// Move a unit toward a point. Clears any attack target.
    Move {
        /// Unit being ordered.
        unit: UnitId,
        /// Requested destination.
        destination: Vec2Fixed,
    },
    /// Order a unit to attack an enemy unit.
    Attack {
        /// Unit being ordered.
        unit: UnitId,
        /// Enemy to engage.
        target: UnitId,
    },
    /// Hand the turn to the next player.
    EndTurn,
}

impl UnitCommand {
    /// Short name for logs and acknowledgements.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::EndTurn => "end_turn",
        }
    }

    /// Whether this command spends an action.
    #[must_use]
    pub const fn costs_action(&self) -> bool {
        !matches!(self, Self::EndTurn)
    }
}
