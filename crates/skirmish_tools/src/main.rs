//! Skirmish - Development Tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "skirmish-tools")]
#[command(about = "Development tools for the skirmish match authority")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate match and unit data files
    Validate {
        /// Data directory or single RON file
        #[arg(default_value = "data")]
        path: PathBuf,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {}", path.display());
            match skirmish_tools::validate::validate_data_directory(&path) {
                Ok(report) if report.is_valid() => {
                    tracing::info!(files = report.files.len(), "Validation passed");
                }
                Ok(report) => {
                    for failure in report.failures() {
                        tracing::error!(
                            "{}: {}",
                            failure.path.display(),
                            failure.error.as_deref().unwrap_or_default()
                        );
                    }
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
