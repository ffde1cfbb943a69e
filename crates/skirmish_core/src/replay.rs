//! Replay system for recording and playing back matches.
//!
//! A replay stores the match configuration and every input the authority
//! received, stamped with the tick it arrived on. Feeding the same inputs
//! at the same ticks into a fresh [`Simulation`] reproduces the match, and
//! the recorded final hash proves it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::components::{PlayerId, UnitCommand};
use crate::config::MatchConfig;
use crate::error::{GameError, Result};
use crate::simulation::Simulation;

/// One input received by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayInput {
    /// A player connected.
    Connect(PlayerId),
    /// A player disconnected.
    Disconnect(PlayerId),
    /// A player sent a command.
    Command(PlayerId, UnitCommand),
}

/// An input stamped with the tick it was applied before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Simulation tick when the input arrived.
    pub tick: u64,
    /// The input.
    pub input: ReplayInput,
}

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Free-form label, usually the scenario name.
    pub label: String,
    /// Rules the match was played under.
    pub config: MatchConfig,
    /// Inputs in arrival order.
    pub inputs: Vec<ReplayRecord>,
    /// Tick at which recording stopped.
    pub final_tick: u64,
    /// State hash at `final_tick`.
    pub final_hash: u64,
}

impl Replay {
    /// Start an empty recording.
    pub fn new(label: impl Into<String>, config: MatchConfig) -> Self {
        Self {
            version: REPLAY_VERSION,
            label: label.into(),
            config,
            inputs: Vec::new(),
            final_tick: 0,
            final_hash: 0,
        }
    }

    /// Record an input arriving at `tick`.
    pub fn record(&mut self, tick: u64, input: ReplayInput) {
        self.inputs.push(ReplayRecord { tick, input });
    }

    /// Close the recording at the simulation's current state.
    pub fn finalize(&mut self, simulation: &Simulation) {
        self.final_tick = simulation.get_tick();
        self.final_hash = simulation.state_hash();
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to write replay file: {e}")))?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or the
    /// file was written by an incompatible version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read replay file: {e}")))?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {}, got {}",
                REPLAY_VERSION, replay.version
            )));
        }

        Ok(replay)
    }

    /// Inputs recorded at a specific tick.
    #[must_use]
    pub fn inputs_at_tick(&self, tick: u64) -> Vec<&ReplayInput> {
        self.inputs
            .iter()
            .filter(|record| record.tick == tick)
            .map(|record| &record.input)
            .collect()
    }

    /// Total duration of the replay in ticks.
    #[must_use]
    pub const fn duration(&self) -> u64 {
        self.final_tick
    }

    /// Total number of recorded inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }
}

/// Feed one input to a simulation, as the live authority would.
fn apply_input(simulation: &mut Simulation, input: &ReplayInput) {
    match input {
        ReplayInput::Connect(player) => {
            if let Err(err) = simulation.connect_player(*player) {
                tracing::debug!(player, %err, "Recorded connection refused on playback");
            }
        }
        ReplayInput::Disconnect(player) => {
            simulation.disconnect_player(*player);
        }
        ReplayInput::Command(player, command) => {
            simulation.apply_command(*player, command.clone());
        }
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    simulation: Simulation,
    /// Index into the input stream.
    input_index: usize,
}

impl ReplayPlayer {
    /// Create a new replay player from a replay.
    ///
    /// # Errors
    /// Returns an error if the recorded configuration is invalid.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = Simulation::new(replay.config.clone())?;
        Ok(Self {
            replay,
            simulation,
            input_index: 0,
        })
    }

    /// Apply the inputs due at the current tick without ticking.
    fn apply_due_inputs(&mut self) {
        let tick = self.simulation.get_tick();
        while let Some(record) = self.replay.inputs.get(self.input_index) {
            if record.tick > tick {
                break;
            }
            apply_input(&mut self.simulation, &record.input);
            self.input_index += 1;
        }
    }

    /// Advance the replay by one tick.
    ///
    /// Returns true if there are more ticks to play.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.apply_due_inputs();
        self.simulation.tick();
        !self.is_finished()
    }

    /// Seek to a specific tick, replaying from the start.
    ///
    /// # Errors
    /// Returns an error if the recorded configuration is invalid.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        self.simulation = Simulation::new(self.replay.config.clone())?;
        self.input_index = 0;

        let target = target_tick.min(self.replay.final_tick);
        while self.simulation.get_tick() < target {
            self.apply_due_inputs();
            self.simulation.tick();
        }
        // Inputs that arrived after the last tick of the recording.
        if target == self.replay.final_tick {
            self.apply_due_inputs();
        }
        Ok(())
    }

    /// Get the current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.simulation.get_tick()
    }

    /// Get a reference to the current simulation state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.simulation.get_tick() >= self.replay.final_tick
    }

    /// Replay the whole recording and compare the final hash.
    ///
    /// # Errors
    /// Returns [`GameError::DesyncDetected`] on a hash mismatch.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.final_tick)?;
        let actual = self.simulation.state_hash();
        if actual != self.replay.final_hash {
            tracing::warn!(
                tick = self.replay.final_tick,
                expected = self.replay.final_hash,
                actual,
                "Replay verification failed"
            );
            return Err(GameError::DesyncDetected {
                tick: self.replay.final_tick,
                expected: self.replay.final_hash,
                actual,
            });
        }
        tracing::info!(tick = self.replay.final_tick, hash = actual, "Replay verified");
        Ok(())
    }

    /// Progress as a percentage (0-100).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.final_tick == 0 {
            100.0
        } else {
            (self.current_tick() as f64 / self.replay.final_tick as f64) * 100.0
        }
    }
}
