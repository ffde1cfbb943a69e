//! Skirmish - Dedicated Server

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use skirmish_core::math::Fixed;
use skirmish_server::ServerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "skirmish_server")]
#[command(about = "Dedicated host for a turn-gated skirmish match")]
#[command(version)]
struct Cli {
    /// Server configuration file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Ticks per second, overrides the config file
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Turn number at which the match is decided
    #[arg(long)]
    turn_cap: Option<u32>,

    /// Seconds per turn
    #[arg(long)]
    turn_seconds: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn server_config(&self) -> skirmish_server::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.bind_addr.clone_from(bind);
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(turn_cap) = self.turn_cap {
            config.match_config.turn_cap = turn_cap;
        }
        if let Some(secs) = self.turn_seconds {
            config.match_config.turn_duration_secs = Fixed::checked_from_num(secs)
                .ok_or_else(|| {
                    skirmish_server::ServerError::Config(format!(
                        "turn_seconds {secs} is out of range"
                    ))
                })?;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    tracing::info!("Starting Skirmish Dedicated Server");

    let config = match cli.server_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        bind = %config.bind_addr,
        tick_rate = config.tick_rate,
        turn_cap = config.match_config.turn_cap,
        "Configuration loaded"
    );

    match skirmish_server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server stopped");
            ExitCode::FAILURE
        }
    }
}
