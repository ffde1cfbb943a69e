//! Unattended matches between two scripted players.
//!
//! [`run_game`] seats two players, lets their [`Strategy`]s issue orders at
//! the start of each of their turns, and ticks until the match is decided
//! or the tick limit is hit.

use serde::{Deserialize, Serialize};
use skirmish_core::components::PlayerId;
use skirmish_core::error::Result;
use skirmish_core::replay::{Replay, ReplayInput};
use skirmish_core::simulation::Simulation;
use tracing::{debug, info};

use crate::scenario::Scenario;
use crate::strategies::Strategy;

/// Seat taken by strategy A.
pub const PLAYER_A: PlayerId = 1;

/// Seat taken by strategy B.
pub const PLAYER_B: PlayerId = 2;

/// Progress logging interval (ticks).
const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// Configuration for a single game run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Scenario to use.
    pub scenario: Scenario,
    /// Strategy for player A, who takes the first turn.
    pub strategy_a: Strategy,
    /// Strategy for player B.
    pub strategy_b: Strategy,
    /// Maximum ticks before giving up. Zero uses the scenario limit.
    pub max_ticks: u64,
    /// Keep a replay of the run.
    pub record: bool,
}

impl GameConfig {
    /// A run of `scenario` between two strategies.
    #[must_use]
    pub fn new(scenario: Scenario, strategy_a: Strategy, strategy_b: Strategy) -> Self {
        Self {
            scenario,
            strategy_a,
            strategy_b,
            max_ticks: 0,
            record: false,
        }
    }

    /// Keep a replay.
    #[must_use]
    pub fn recorded(mut self) -> Self {
        self.record = true;
        self
    }

    fn tick_limit(&self) -> u64 {
        if self.max_ticks == 0 {
            self.scenario.max_ticks
        } else {
            self.max_ticks
        }
    }
}

/// Result of running a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResult {
    /// Scenario name.
    pub scenario: String,
    /// Strategy of player A.
    pub strategy_a: Strategy,
    /// Strategy of player B.
    pub strategy_b: Strategy,
    /// Whether the match was decided before the tick limit.
    pub decided: bool,
    /// Winner, `None` for a draw or an undecided run.
    pub winner: Option<PlayerId>,
    /// Ticks simulated.
    pub ticks: u64,
    /// Turn number at the end.
    pub turn_number: u32,
    /// Whether the stalemate breaker kicked in.
    pub speed_unlocked: bool,
    /// Live units left for A and B.
    pub units_left: [usize; 2],
    /// Commands the authority refused.
    pub rejected_commands: u32,
    /// State hash at the end.
    pub final_state_hash: u64,
    /// The recording, when requested.
    #[serde(skip)]
    pub replay: Option<Replay>,
}

/// Run a complete match.
///
/// # Errors
///
/// Returns an error if the scenario's rules are invalid or a seat cannot
/// be claimed.
pub fn run_game(config: &GameConfig) -> Result<GameResult> {
    let max_ticks = config.tick_limit();
    info!(
        scenario = %config.scenario.name,
        strategy_a = %config.strategy_a,
        strategy_b = %config.strategy_b,
        max_ticks,
        "Starting game simulation"
    );

    let mut sim = Simulation::new(config.scenario.rules.clone())?;
    let mut replay = config
        .record
        .then(|| Replay::new(config.scenario.name.clone(), config.scenario.rules.clone()));

    for player in [PLAYER_A, PLAYER_B] {
        if let Some(replay) = replay.as_mut() {
            replay.record(sim.get_tick(), ReplayInput::Connect(player));
        }
        sim.connect_player(player)?;
    }

    let mut planned_turn = None;
    let mut rejected_commands = 0;

    while !sim.is_over() && sim.get_tick() < max_ticks {
        if let Some(player) = sim.current_player() {
            let turn = (player, sim.turn_status().turn_number);
            if planned_turn != Some(turn) {
                planned_turn = Some(turn);
                let strategy = if player == PLAYER_A {
                    config.strategy_a
                } else {
                    config.strategy_b
                };
                for command in strategy.plan(&sim, player) {
                    if let Some(replay) = replay.as_mut() {
                        replay.record(sim.get_tick(), ReplayInput::Command(player, command.clone()));
                    }
                    let outcome = sim.apply_command(player, command);
                    if let Some(reason) = outcome.rejection {
                        debug!(player, %reason, "Scripted command rejected");
                        rejected_commands += 1;
                    }
                }
            }
        }

        sim.tick();

        if sim.get_tick() % PROGRESS_LOG_INTERVAL == 0 {
            debug!(
                tick = sim.get_tick(),
                turn = sim.turn_status().turn_number,
                units_a = sim.roster().live_unit_count_for(PLAYER_A),
                units_b = sim.roster().live_unit_count_for(PLAYER_B),
                "Game progress"
            );
        }
    }

    if let Some(replay) = replay.as_mut() {
        replay.finalize(&sim);
    }

    let result = GameResult {
        scenario: config.scenario.name.clone(),
        strategy_a: config.strategy_a,
        strategy_b: config.strategy_b,
        decided: sim.is_over(),
        winner: sim.winner().flatten(),
        ticks: sim.get_tick(),
        turn_number: sim.turn_status().turn_number,
        speed_unlocked: sim.is_speed_unlocked(),
        units_left: [
            sim.roster().live_unit_count_for(PLAYER_A),
            sim.roster().live_unit_count_for(PLAYER_B),
        ],
        rejected_commands,
        final_state_hash: sim.state_hash(),
        replay,
    };

    info!(
        decided = result.decided,
        winner = ?result.winner,
        ticks = result.ticks,
        turn = result.turn_number,
        "Game finished"
    );
    Ok(result)
}
