//! Scenario loading and configuration.
//!
//! A scenario names a match ruleset and a tick limit for unattended runs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use skirmish_core::config::{MatchConfig, SpawnPoint};
use skirmish_core::data::UnitStats;
use skirmish_core::error::GameError;
use skirmish_core::math::Fixed;
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The match rules are invalid.
    #[error("Invalid scenario: {0}")]
    Invalid(#[from] GameError),
}

/// Default tick limit: twenty minutes of game time.
pub const DEFAULT_MAX_TICKS: u64 = 20 * 60 * 20;

fn default_max_ticks() -> u64 {
    DEFAULT_MAX_TICKS
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Match rules.
    #[serde(default)]
    pub rules: MatchConfig,
    /// Ticks after which an unattended run gives up.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish_1v1()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.rules.validate()?;
        Ok(scenario)
    }

    /// A built-in scenario by name, or a RON file at that path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Look up a built-in scenario.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "skirmish_1v1" => Some(Self::skirmish_1v1()),
            "duel" => Some(Self::duel()),
            _ => None,
        }
    }

    /// Names accepted by [`Scenario::builtin`].
    pub const BUILTIN: [&'static str; 2] = ["skirmish_1v1", "duel"];

    /// Full squads on the default field.
    #[must_use]
    pub fn skirmish_1v1() -> Self {
        Self {
            name: "skirmish_1v1".to_string(),
            description: "Five units per side, 60 second turns, cap at turn 20".to_string(),
            rules: MatchConfig::default(),
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }

    /// One rifleman each, close together, short turns.
    #[must_use]
    pub fn duel() -> Self {
        let rifleman = UnitStats {
            id: "rifleman".to_string(),
            move_speed: Fixed::from_num(4),
            attack_range: Fixed::from_num(8),
            damage: 25,
            fire_rate: Fixed::from_num(1),
            health: 100,
        };
        Self {
            name: "duel".to_string(),
            description: "One rifleman per side, 5 second turns".to_string(),
            rules: MatchConfig {
                turn_duration_secs: Fixed::from_num(5),
                max_actions_per_turn: 1,
                turn_cap: 10,
                max_players: 2,
                squad: vec![rifleman],
                spawn_points: vec![vec![SpawnPoint::new(-10, 0)], vec![SpawnPoint::new(10, 0)]],
            },
            max_ticks: 2_000,
        }
    }
}
