//! Headless skirmish runner.
//!
//! This binary runs a match without a network host, controlled via JSON on
//! stdin/stdout or by scripted strategies. Designed for AI agents, CI
//! testing, and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p skirmish_headless
//!
//! # Interactive, recording a replay on exit
//! cargo run -p skirmish_headless -- run --scenario duel --record session.replay
//!
//! # Scripted match
//! cargo run -p skirmish_headless -- simulate --scenario skirmish_1v1 --a aggressive --b focus
//!
//! # Check a replay
//! cargo run -p skirmish_headless -- verify session.replay
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use skirmish_core::replay::{Replay, ReplayPlayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_headless::{
    run_game, GameConfig, HeadlessConfig, HeadlessRunner, Scenario, Strategy,
};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless skirmish runner for AI testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive match over stdin/stdout
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Output state after every tick command
        #[arg(long)]
        auto_state: bool,

        /// Write a replay here when the session ends
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Play two scripted strategies against each other
    Simulate {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Strategy for player 1
        #[arg(long, default_value = "aggressive")]
        a: Strategy,

        /// Strategy for player 2
        #[arg(long, default_value = "focus")]
        b: Strategy,

        /// Tick limit, overriding the scenario's
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Write a replay of the match here
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Replay a recording and check its final state hash
    Verify {
        /// Replay file path
        replay: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            auto_state,
            record,
        }) => cmd_run(&scenario, auto_state, record.as_deref()),
        Some(Commands::Simulate {
            scenario,
            a,
            b,
            max_ticks,
            record,
        }) => cmd_simulate(&scenario, a, b, max_ticks, record.as_deref()),
        Some(Commands::Verify { replay }) => cmd_verify(&replay),
        None => cmd_run("skirmish_1v1", false, None),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

/// Run a single interactive match
fn cmd_run(scenario: &str, auto_state: bool, record: Option<&Path>) -> Result<(), String> {
    let scenario = Scenario::resolve(scenario).map_err(|e| e.to_string())?;
    tracing::info!(scenario = %scenario.name, "Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        record: record.is_some(),
    };
    let mut runner = HeadlessRunner::with_config(&scenario, config).map_err(|e| e.to_string())?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    runner
        .run(stdin.lock(), stdout.lock())
        .map_err(|e| format!("I/O error: {e}"))?;

    if let (Some(path), Some(replay)) = (record, runner.finish()) {
        save_replay(&replay, path)?;
    }
    Ok(())
}

/// Run a scripted match and print its result as JSON
fn cmd_simulate(
    scenario: &str,
    a: Strategy,
    b: Strategy,
    max_ticks: Option<u64>,
    record: Option<&Path>,
) -> Result<(), String> {
    let scenario = Scenario::resolve(scenario).map_err(|e| e.to_string())?;
    let mut config = GameConfig::new(scenario, a, b);
    config.max_ticks = max_ticks.unwrap_or(0);
    config.record = record.is_some();

    let result = run_game(&config).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
    println!("{json}");

    if let (Some(path), Some(replay)) = (record, result.replay.as_ref()) {
        save_replay(replay, path)?;
    }
    Ok(())
}

/// Replay a recording and compare hashes
fn cmd_verify(path: &Path) -> Result<(), String> {
    let replay = Replay::load(path).map_err(|e| e.to_string())?;
    tracing::info!(
        label = %replay.label,
        inputs = replay.input_count(),
        ticks = replay.duration(),
        "Verifying replay"
    );
    let mut player = ReplayPlayer::new(replay).map_err(|e| e.to_string())?;
    player.verify().map_err(|e| e.to_string())?;
    eprintln!("Replay verified: {}", path.display());
    Ok(())
}

fn save_replay(replay: &Replay, path: &Path) -> Result<(), String> {
    replay.save(path).map_err(|e| e.to_string())?;
    tracing::info!(
        path = %path.display(),
        inputs = replay.input_count(),
        final_tick = replay.final_tick,
        "Replay saved"
    );
    Ok(())
}
