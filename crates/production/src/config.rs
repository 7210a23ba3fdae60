//! Coordinator configuration file.
//!
//! All fields are optional; missing ones keep their defaults.
//!
//! ```toml
//! vote_timeout_ms = 1000
//! ack_timeout_ms = 2200
//! recovery_settle_delay_ms = 5000
//! round_deadline_ms = 3200
//! decided_history = 4096
//! max_in_flight = 4096
//! connect_timeout_ms = 1000
//! request_timeout_ms = 3000
//! ```

use crate::network::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use twophase_coordinator::{ConfigError, CoordinatorConfig};

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// On-disk form of the coordinator settings. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub vote_timeout_ms: u64,
    pub ack_timeout_ms: u64,
    pub recovery_settle_delay_ms: u64,
    pub round_deadline_ms: u64,
    pub decided_history: usize,
    pub max_in_flight: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        let coordinator = CoordinatorConfig::default();
        let transport = TransportConfig::default();
        Self {
            vote_timeout_ms: coordinator.vote_timeout.as_millis() as u64,
            ack_timeout_ms: coordinator.ack_timeout.as_millis() as u64,
            recovery_settle_delay_ms: coordinator.recovery_settle_delay.as_millis() as u64,
            round_deadline_ms: coordinator.round_deadline.as_millis() as u64,
            decided_history: coordinator.decided_history,
            max_in_flight: coordinator.max_in_flight,
            connect_timeout_ms: transport.connect_timeout.as_millis() as u64,
            request_timeout_ms: transport.request_timeout.as_millis() as u64,
        }
    }
}

impl FileConfig {
    /// Load and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Build the validated coordinator configuration.
    pub fn coordinator(&self) -> Result<CoordinatorConfig, ConfigFileError> {
        let config = CoordinatorConfig::default()
            .with_vote_timeout(Duration::from_millis(self.vote_timeout_ms))
            .with_ack_timeout(Duration::from_millis(self.ack_timeout_ms))
            .with_recovery_settle_delay(Duration::from_millis(self.recovery_settle_delay_ms))
            .with_round_deadline(Duration::from_millis(self.round_deadline_ms))
            .with_decided_history(self.decided_history)
            .with_max_in_flight(self.max_in_flight);
        config.validate()?;
        Ok(config)
    }

    /// Build the transport configuration.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default()
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
    }
}
