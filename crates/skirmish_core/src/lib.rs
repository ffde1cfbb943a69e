//! # Skirmish Core
//!
//! Deterministic rules for a turn-gated real-time skirmish.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond loading data files
//! - No randomness
//! - No floating-point math in the simulation (uses fixed-point)
//!
//! This separation enables:
//! - A dedicated host that owns the one authoritative [`simulation::Simulation`]
//! - Headless runs for AI and CI
//! - Replay recording and verification
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`components`] - Per-unit component data and player commands
//! - [`config`] - Match rules loaded from RON
//! - [`turn`] - Turn state machine
//! - [`roster`] - Ownership, liveness and range queries
//! - [`systems`] - Combat, movement and health rules
//! - [`simulation`] - The match authority and its tick loop
//! - [`events`] - Everything observable about a match
//! - [`replay`] - Input recording and playback
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod components;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod math;
pub mod replay;
pub mod roster;
pub mod simulation;
pub mod systems;
pub mod turn;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{MatchConfig, SpawnPoint};
    pub use crate::data::UnitStats;
    pub use crate::error::{CommandError, GameError, Result};
    pub use crate::events::{MatchEvent, TurnEndReason};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::replay::{Replay, ReplayInput, ReplayPlayer};
    pub use crate::roster::{Outcome, Roster};
    pub use crate::simulation::{
        CommandOutcome, MatchSnapshot, Simulation, TickEvents, UnitSnapshot, TICK_RATE,
    };
    pub use crate::turn::{TurnPhase, TurnStatus};
}
