//! Test fixtures and helpers.
//!
//! Pre-built match configurations and scripted play for consistent
//! testing.

use fixed::types::I32F32;
use skirmish_core::components::{PlayerId, UnitCommand};
use skirmish_core::config::{MatchConfig, SpawnPoint};
use skirmish_core::data::UnitStats;
use skirmish_core::simulation::Simulation;

/// First player in every fixture match. Holds turn 1.
pub const PLAYER_ONE: PlayerId = 1;

/// Second player in every fixture match.
pub const PLAYER_TWO: PlayerId = 2;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Rifleman: 4 u/s, range 8, 25 damage every second, 100 HP.
#[must_use]
pub fn rifleman() -> UnitStats {
    UnitStats {
        id: "rifleman".to_string(),
        move_speed: fixed(4),
        attack_range: fixed(8),
        damage: 25,
        fire_rate: fixed(1),
        health: 100,
    }
}

/// Scout: 8 u/s, range 5, 10 damage every half second, 60 HP.
#[must_use]
pub fn scout() -> UnitStats {
    UnitStats {
        id: "scout".to_string(),
        move_speed: fixed(8),
        attack_range: fixed(5),
        damage: 10,
        fire_rate: fixed_f(0.5),
        health: 60,
    }
}

/// One rifleman per side, `gap` apart on the x axis, one-second turns.
#[must_use]
pub fn duel_config(gap: i32, turn_cap: u32) -> MatchConfig {
    MatchConfig {
        turn_duration_secs: fixed(1),
        max_actions_per_turn: 2,
        turn_cap,
        max_players: 2,
        squad: vec![rifleman()],
        spawn_points: vec![vec![SpawnPoint::new(0, 0)], vec![SpawnPoint::new(gap, 0)]],
    }
}

/// Rifleman and scout per side facing each other at short range.
#[must_use]
pub fn skirmish_config() -> MatchConfig {
    MatchConfig {
        turn_duration_secs: fixed(2),
        max_actions_per_turn: 2,
        turn_cap: 12,
        max_players: 2,
        squad: vec![rifleman(), scout()],
        spawn_points: vec![
            vec![SpawnPoint::new(-6, 0), SpawnPoint::new(-6, 4)],
            vec![SpawnPoint::new(6, 0), SpawnPoint::new(6, 4)],
        ],
    }
}

/// Build a match and connect [`PLAYER_ONE`] and [`PLAYER_TWO`].
///
/// # Panics
///
/// Panics if the configuration is invalid.
#[must_use]
pub fn started_match(config: MatchConfig) -> Simulation {
    let mut sim = Simulation::new(config).expect("fixture config must be valid");
    sim.connect_player(PLAYER_ONE)
        .expect("first player must get a slot");
    sim.connect_player(PLAYER_TWO)
        .expect("second player must get a slot");
    sim
}

/// One scripted input: a command followed by some ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    /// Sender.
    pub player: PlayerId,
    /// Command to apply.
    pub command: UnitCommand,
    /// Ticks to run after the command.
    pub ticks_after: u32,
}

/// Apply a script to a simulation, ignoring rejections.
pub fn run_script(sim: &mut Simulation, script: &[ScriptStep]) {
    for step in script {
        sim.apply_command(step.player, step.command.clone());
        for _ in 0..step.ticks_after {
            sim.tick();
        }
    }
}
