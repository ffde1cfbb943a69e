//! Host configuration.
//!
//! Loaded from RON; command-line flags override individual fields.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skirmish_core::config::MatchConfig;
use skirmish_core::simulation::TICK_RATE;

use crate::error::{Result, ServerError};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,
    /// Ticks per wall-clock second. Game time is always measured in
    /// simulation ticks, so any other value speeds the match up or slows
    /// it down.
    pub tick_rate: u32,
    /// Rules of the hosted match.
    pub match_config: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            tick_rate: TICK_RATE,
            match_config: MatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load a server configuration from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_ron_str(&contents)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse a server configuration from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] on malformed input.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Wall-clock time between ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate.max(1)))
    }

    /// Check the host settings and the match rules.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for a zero tick rate or an empty
    /// bind address, and [`ServerError::Game`] for invalid match rules.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 {
            return Err(ServerError::Config("tick_rate must be positive".into()));
        }
        if self.bind_addr.trim().is_empty() {
            return Err(ServerError::Config("bind_addr must not be empty".into()));
        }
        self.match_config.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = ServerConfig::from_ron_str(r#"(bind_addr: "0.0.0.0:9000", tick_rate: 40)"#)
            .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.tick_interval(), Duration::from_millis(25));
        assert_eq!(config.match_config, MatchConfig::default());
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        let config = ServerConfig {
            tick_rate: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_invalid_match_rules_rejected() {
        let mut config = ServerConfig::default();
        config.match_config.max_actions_per_turn = 0;
        assert!(matches!(config.validate(), Err(ServerError::Game(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(tick_rate: 10)").unwrap();
        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.tick_rate, 10);
        assert_eq!(config.bind_addr, "127.0.0.1:7777");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ServerConfig::load("/nonexistent/server.ron"),
            Err(ServerError::Config(_))
        ));
    }
}
