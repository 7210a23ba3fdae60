//! Coordinator configuration.

use std::time::Duration;
use thiserror::Error;

/// Errors from [`CoordinatorConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("ack timeout ({ack:?}) must be longer than vote timeout ({vote:?})")]
    AckWindowTooShort { vote: Duration, ack: Duration },

    #[error("round deadline ({deadline:?}) must be longer than ack timeout ({ack:?})")]
    DeadlineTooShort { ack: Duration, deadline: Duration },
}

/// Configuration for the coordinator's windows and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long votes are collected after the first vote of a transaction.
    pub vote_timeout: Duration,

    /// How long acks are collected after the first ack of a transaction.
    ///
    /// Must exceed `vote_timeout` so replicas have time to apply.
    pub ack_timeout: Duration,

    /// Delay between a crashed participant re-registering and the coordinator
    /// pushing the backup log to it.
    pub recovery_settle_delay: Duration,

    /// How long a transaction may wait for its first vote after `Prepare`,
    /// and for its first ack after the decision, before it is closed.
    ///
    /// Must exceed `ack_timeout`.
    pub round_deadline: Duration,

    /// How many closed transaction ids are remembered so late votes and acks
    /// can be recognised and dropped.
    pub decided_history: usize,

    /// Upper bound on open transaction contexts. When exceeded, the oldest
    /// context still waiting for its first ack is dropped, or the oldest
    /// context if none is.
    pub max_in_flight: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            vote_timeout: Duration::from_millis(1000),
            ack_timeout: Duration::from_millis(2200),
            recovery_settle_delay: Duration::from_secs(5),
            round_deadline: Duration::from_millis(3200),
            decided_history: 4096,
            max_in_flight: 4096,
        }
    }
}

impl CoordinatorConfig {
    /// Set the vote window.
    pub fn with_vote_timeout(mut self, timeout: Duration) -> Self {
        self.vote_timeout = timeout;
        self
    }

    /// Set the ack window.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the recovery settle delay.
    pub fn with_recovery_settle_delay(mut self, delay: Duration) -> Self {
        self.recovery_settle_delay = delay;
        self
    }

    /// Set the deadline for a round that draws no response.
    pub fn with_round_deadline(mut self, deadline: Duration) -> Self {
        self.round_deadline = deadline;
        self
    }

    /// Set the decided-history capacity.
    pub fn with_decided_history(mut self, capacity: usize) -> Self {
        self.decided_history = capacity;
        self
    }

    /// Set the in-flight context limit.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = limit;
        self
    }

    /// Check the windows and capacities are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vote_timeout.is_zero() {
            return Err(ConfigError::Zero("vote timeout"));
        }
        if self.recovery_settle_delay.is_zero() {
            return Err(ConfigError::Zero("recovery settle delay"));
        }
        if self.decided_history == 0 {
            return Err(ConfigError::Zero("decided history"));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Zero("max in flight"));
        }
        if self.ack_timeout <= self.vote_timeout {
            return Err(ConfigError::AckWindowTooShort {
                vote: self.vote_timeout,
                ack: self.ack_timeout,
            });
        }
        if self.round_deadline <= self.ack_timeout {
            return Err(ConfigError::DeadlineTooShort {
                ack: self.ack_timeout,
                deadline: self.round_deadline,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(CoordinatorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_ack_window_must_exceed_vote_window() {
        let config = CoordinatorConfig::default()
            .with_vote_timeout(Duration::from_secs(2))
            .with_ack_timeout(Duration::from_secs(2));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AckWindowTooShort { .. })
        ));
    }

    #[test]
    fn test_deadline_must_exceed_ack_window() {
        let config = CoordinatorConfig::default().with_round_deadline(Duration::from_secs(2));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DeadlineTooShort { .. })
        ));
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = CoordinatorConfig::default().with_vote_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::Zero("vote timeout")));

        let config = CoordinatorConfig::default().with_decided_history(0);
        assert_eq!(config.validate(), Err(ConfigError::Zero("decided history")));
    }
}
