//! Error types for the host.

use skirmish_core::error::GameError;
use thiserror::Error;

/// Result type alias using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Failures that stop the host or a single connection.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket or stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad host configuration.
    #[error("Invalid server configuration: {0}")]
    Config(String),

    /// The match rules were rejected by the authority.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The authority task has stopped.
    #[error("Match host has shut down")]
    HostClosed,
}
