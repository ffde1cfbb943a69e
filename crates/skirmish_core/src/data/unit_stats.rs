//! Per-unit-type statistics.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{checked_seconds_to_ticks, fixed_serde, Fixed};
use crate::simulation::TICK_RATE;

/// Default starting hit points for units whose data omits them.
const fn default_health() -> u32 {
    100
}

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitStats(
///     id: "rifleman",
///     move_speed: 4.0,
///     attack_range: 8.0,
///     damage: 25,
///     fire_rate: 1.0,
///     health: 100,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Unit type identifier.
    pub id: String,

    /// Movement speed in world units per second.
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,

    /// Distance at which the unit can hit a target.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,

    /// Damage dealt per shot.
    pub damage: u32,

    /// Seconds between two shots.
    #[serde(with = "fixed_serde")]
    pub fire_rate: Fixed,

    /// Starting (and maximum) hit points.
    #[serde(default = "default_health")]
    pub health: u32,
}

impl UnitStats {
    /// Distance covered in one tick at full speed.
    #[must_use]
    pub fn speed_per_tick(&self) -> Fixed {
        self.move_speed / Fixed::from_num(TICK_RATE)
    }

    /// Minimum ticks between shots, rounded up and never zero.
    ///
    /// Saturates at `u32::MAX` for a fire rate that [`Self::validate`]
    /// would reject.
    #[must_use]
    pub fn cooldown_ticks(&self) -> u32 {
        checked_seconds_to_ticks(self.fire_rate, TICK_RATE)
            .unwrap_or(u32::MAX)
            .max(1)
    }

    /// Check that every stat is usable by the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let bad = |field: &str| {
            Err(GameError::InvalidConfig(format!(
                "unit '{}': {field} must be positive",
                self.id
            )))
        };

        if self.id.is_empty() {
            return Err(GameError::InvalidConfig("unit id is empty".to_string()));
        }
        if self.move_speed <= Fixed::ZERO {
            return bad("move_speed");
        }
        if self.attack_range <= Fixed::ZERO {
            return bad("attack_range");
        }
        if self.fire_rate <= Fixed::ZERO {
            return bad("fire_rate");
        }
        if checked_seconds_to_ticks(self.fire_rate, TICK_RATE).is_none() {
            return Err(GameError::InvalidConfig(format!(
                "unit '{}': fire_rate {} is too large",
                self.id, self.fire_rate
            )));
        }
        if self.health == 0 {
            return bad("health");
        }
        Ok(())
    }
}
