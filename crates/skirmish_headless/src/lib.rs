//! Headless match runner for AI testing and CI verification.
//!
//! This crate drives a match without a network host. It can be controlled
//! via JSON commands on stdin, with responses on stdout, or it can pit two
//! scripted strategies against each other. This enables:
//!
//! - **AI testing**: An agent plays both seats through the JSON protocol
//! - **CI verification**: Scripted matches check rules and determinism
//! - **Replay verification**: Recorded matches must reproduce their hash
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (connect, tick, move, attack, etc.)
//! - **stdout**: Responses and match events (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command/response specification.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"connect","player":1}' | cargo run -p skirmish_headless
//!
//! # Pit two strategies against each other and keep a replay
//! cargo run -p skirmish_headless -- simulate --a focus --b advance --record match.replay
//!
//! # Verify the replay
//! cargo run -p skirmish_headless -- verify match.replay
//! ```

pub mod game_runner;
pub mod protocol;
pub mod runner;
pub mod scenario;
pub mod strategies;

pub use game_runner::{run_game, GameConfig, GameResult};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError};
pub use strategies::Strategy;
