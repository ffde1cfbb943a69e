//! Match configuration.
//!
//! A [`MatchConfig`] describes the turn budget, the turn cap, the squad
//! every player receives and where each player slot spawns. It is usually
//! authored as a RON file and checked with [`MatchConfig::validate`] before
//! a match starts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::UnitStats;
use crate::error::{GameError, Result};
use crate::math::{checked_seconds_to_ticks, fixed_serde, Fixed, Vec2Fixed};
use crate::simulation::TICK_RATE;

/// A spawn point as authored in data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// World X.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// World Z.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

impl SpawnPoint {
    /// Create a spawn point from integer coordinates.
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: Fixed::from_num(x),
            y: Fixed::from_num(y),
        }
    }

    /// Position on the ground plane.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        Vec2Fixed::new(self.x, self.y)
    }
}

/// Rules and layout for a single match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Seconds a player has to act before the turn passes.
    #[serde(with = "fixed_serde")]
    pub turn_duration_secs: Fixed,
    /// Commands a player may issue per turn.
    pub max_actions_per_turn: u32,
    /// Turn number at which the match is decided by unit count.
    pub turn_cap: u32,
    /// Players required before the first turn starts.
    pub max_players: u8,
    /// Units spawned for every player, in spawn-point order.
    pub squad: Vec<UnitStats>,
    /// Spawn points per player slot.
    pub spawn_points: Vec<Vec<SpawnPoint>>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        let rifleman = UnitStats {
            id: "rifleman".to_string(),
            move_speed: Fixed::from_num(4),
            attack_range: Fixed::from_num(8),
            damage: 25,
            fire_rate: Fixed::from_num(1),
            health: 100,
        };
        let scout = UnitStats {
            id: "scout".to_string(),
            move_speed: Fixed::from_num(8),
            attack_range: Fixed::from_num(5),
            damage: 10,
            fire_rate: Fixed::from_num(0.5),
            health: 60,
        };
        let heavy = UnitStats {
            id: "heavy".to_string(),
            move_speed: Fixed::from_num(2),
            attack_range: Fixed::from_num(10),
            damage: 50,
            fire_rate: Fixed::from_num(2),
            health: 180,
        };

        Self {
            turn_duration_secs: Fixed::from_num(60),
            max_actions_per_turn: 2,
            turn_cap: 20,
            max_players: 2,
            squad: vec![
                rifleman.clone(),
                rifleman,
                scout.clone(),
                scout,
                heavy,
            ],
            spawn_points: vec![
                (0..5).map(|i| SpawnPoint::new(-40, -20 + i * 10)).collect(),
                (0..5).map(|i| SpawnPoint::new(40, -20 + i * 10)).collect(),
            ],
        }
    }
}

impl MatchConfig {
    /// Load a match configuration from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&contents).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Parse a match configuration from a RON string.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] on malformed input.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Turn duration converted to ticks, rounded up.
    ///
    /// Zero for a negative duration and `u32::MAX` for one too large to
    /// convert; [`Self::validate`] rejects both.
    #[must_use]
    pub fn turn_duration_ticks(&self) -> u32 {
        if self.turn_duration_secs <= Fixed::ZERO {
            return 0;
        }
        checked_seconds_to_ticks(self.turn_duration_secs, TICK_RATE).unwrap_or(u32::MAX)
    }

    /// Spawn points for a player slot.
    #[must_use]
    pub fn spawn_points_for(&self, slot: usize) -> &[SpawnPoint] {
        self.spawn_points.get(slot).map_or(&[], Vec::as_slice)
    }

    /// Check the configuration is playable.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.max_players < 2 {
            return Err(GameError::InvalidConfig(format!(
                "max_players must be at least 2, got {}",
                self.max_players
            )));
        }
        if self.max_actions_per_turn == 0 {
            return Err(GameError::InvalidConfig(
                "max_actions_per_turn must be positive".to_string(),
            ));
        }
        if self.turn_duration_secs <= Fixed::ZERO {
            return Err(GameError::InvalidConfig(
                "turn_duration_secs must be positive".to_string(),
            ));
        }
        if checked_seconds_to_ticks(self.turn_duration_secs, TICK_RATE).is_none() {
            return Err(GameError::InvalidConfig(format!(
                "turn_duration_secs {} is too large",
                self.turn_duration_secs
            )));
        }
        if self.turn_cap == 0 {
            return Err(GameError::InvalidConfig(
                "turn_cap must be positive".to_string(),
            ));
        }
        if self.squad.is_empty() {
            return Err(GameError::InvalidConfig("squad is empty".to_string()));
        }
        if self.spawn_points.len() < usize::from(self.max_players) {
            return Err(GameError::InvalidConfig(format!(
                "{} spawn point lists for {} players",
                self.spawn_points.len(),
                self.max_players
            )));
        }
        for (slot, points) in self.spawn_points.iter().enumerate() {
            if points.len() < self.squad.len() {
                return Err(GameError::InvalidConfig(format!(
                    "slot {slot} has {} spawn points, squad needs {}",
                    points.len(),
                    self.squad.len()
                )));
            }
        }
        for unit in &self.squad {
            unit.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.squad.len(), 5);
        assert_eq!(config.turn_duration_ticks(), 60 * TICK_RATE);
    }

    #[test]
    fn rejects_short_spawn_list() {
        let mut config = MatchConfig::default();
        config.spawn_points[1].truncate(3);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("slot 1"));
    }

    #[test]
    fn rejects_negative_turn_duration() {
        let config = MatchConfig {
            turn_duration_secs: Fixed::from_num(-5),
            ..MatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, GameError::InvalidConfig(ref msg) if msg.contains("turn_duration_secs"))
        );
        assert_eq!(config.turn_duration_ticks(), 0);
    }

    #[test]
    fn rejects_oversized_turn_duration() {
        let config = MatchConfig {
            turn_duration_secs: Fixed::MAX,
            ..MatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GameError::InvalidConfig(ref msg) if msg.contains("too large")));
        assert_eq!(config.turn_duration_ticks(), u32::MAX);
    }

    #[test]
    fn rejects_oversized_fire_rate_in_squad() {
        let mut config = MatchConfig::default();
        config.squad[0].fire_rate = Fixed::MAX;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GameError::InvalidConfig(ref msg) if msg.contains("fire_rate")));
    }

    #[test]
    fn rejects_single_player() {
        let config = MatchConfig {
            max_players: 1,
            ..MatchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_ron() {
        let source = r#"MatchConfig(
            turn_duration_secs: 30.0,
            max_actions_per_turn: 3,
            turn_cap: 10,
            max_players: 2,
            squad: [
                UnitStats(id: "rifleman", move_speed: 4.0, attack_range: 8.0, damage: 25, fire_rate: 1.0),
            ],
            spawn_points: [
                [SpawnPoint(x: -10.0, y: 0.0)],
                [SpawnPoint(x: 10.0, y: 0.0)],
            ],
        )"#;
        let config = MatchConfig::from_ron_str(source).unwrap();
        assert_eq!(config.max_actions_per_turn, 3);
        assert_eq!(config.turn_duration_ticks(), 30 * TICK_RATE);
        assert_eq!(config.spawn_points_for(1)[0].position(), Vec2Fixed::from_ints(10, 0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = MatchConfig::load("/nonexistent/match.ron").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { .. }));
    }
}
