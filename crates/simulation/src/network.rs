//! Simulated network: latency, jitter and fault injection.

use crate::Endpoint;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Latency model for the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// One-way latency for every message.
    pub base_latency: Duration,

    /// Upper bound of the random extra latency added per message.
    pub jitter: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_latency: Duration::from_millis(10),
            jitter: Duration::from_millis(5),
        }
    }
}

impl NetworkConfig {
    /// Set the base latency.
    pub fn with_base_latency(mut self, latency: Duration) -> Self {
        self.base_latency = latency;
        self
    }

    /// Set the jitter bound.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Drops every message matching all of its set fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropRule {
    pub from: Option<Endpoint>,
    pub to: Option<Endpoint>,
    /// Request type name, e.g. `"AckCommit"`.
    pub kind: Option<&'static str>,
}

impl DropRule {
    /// Drop everything sent by `from`.
    pub fn sent_by(from: Endpoint) -> Self {
        Self {
            from: Some(from),
            ..Default::default()
        }
    }

    /// Drop everything sent to `to`.
    pub fn sent_to(to: Endpoint) -> Self {
        Self {
            to: Some(to),
            ..Default::default()
        }
    }

    /// Only match requests of type `kind`.
    pub fn of_kind(mut self, kind: &'static str) -> Self {
        self.kind = Some(kind);
        self
    }

    fn matches(&self, from: Endpoint, to: Endpoint, kind: &str) -> bool {
        self.from.map_or(true, |f| f == from)
            && self.to.map_or(true, |t| t == to)
            && self.kind.map_or(true, |k| k == kind)
    }
}

/// Seeded network. Same seed, same latencies.
pub struct SimulatedNetwork {
    config: NetworkConfig,
    rng: ChaCha8Rng,
    rules: Vec<DropRule>,
    isolated: BTreeSet<Endpoint>,
}

impl SimulatedNetwork {
    /// Create a network with the given latency model.
    pub fn new(config: NetworkConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            rules: Vec::new(),
            isolated: BTreeSet::new(),
        }
    }

    /// Get the latency model.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Sample the one-way latency of the next message.
    pub fn sample_latency(&mut self) -> Duration {
        let jitter_ns = self.config.jitter.as_nanos() as u64;
        let extra = if jitter_ns == 0 {
            0
        } else {
            self.rng.gen_range(0..=jitter_ns)
        };
        self.config.base_latency + Duration::from_nanos(extra)
    }

    /// Add a drop rule.
    pub fn add_drop_rule(&mut self, rule: DropRule) {
        self.rules.push(rule);
    }

    /// Remove all drop rules.
    pub fn clear_drop_rules(&mut self) {
        self.rules.clear();
    }

    /// Cut `endpoint` off from everyone.
    pub fn isolate(&mut self, endpoint: Endpoint) {
        self.isolated.insert(endpoint);
    }

    /// Reconnect `endpoint`.
    pub fn heal(&mut self, endpoint: Endpoint) {
        self.isolated.remove(&endpoint);
    }

    /// Check if a message of type `kind` from `from` to `to` is lost.
    pub fn should_drop(&self, from: Endpoint, to: Endpoint, kind: &str) -> bool {
        self.isolated.contains(&from)
            || self.isolated.contains(&to)
            || self.rules.iter().any(|rule| rule.matches(from, to, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_is_deterministic_per_seed() {
        let config = NetworkConfig::default();
        let mut a = SimulatedNetwork::new(config.clone(), 42);
        let mut b = SimulatedNetwork::new(config.clone(), 42);

        let first: Vec<_> = (0..16).map(|_| a.sample_latency()).collect();
        let second: Vec<_> = (0..16).map(|_| b.sample_latency()).collect();
        assert_eq!(first, second);

        let max = config.base_latency + config.jitter;
        assert!(first
            .iter()
            .all(|latency| *latency >= config.base_latency && *latency <= max));
    }

    #[test]
    fn test_zero_jitter() {
        let config = NetworkConfig::default().with_jitter(Duration::ZERO);
        let mut network = SimulatedNetwork::new(config, 1);
        assert_eq!(network.sample_latency(), Duration::from_millis(10));
    }

    #[test]
    fn test_drop_rules() {
        let mut network = SimulatedNetwork::new(NetworkConfig::default(), 1);
        network.add_drop_rule(DropRule::sent_by(Endpoint::Participant(2)).of_kind("AckCommit"));

        assert!(network.should_drop(Endpoint::Participant(2), Endpoint::Coordinator, "AckCommit"));
        assert!(!network.should_drop(Endpoint::Participant(2), Endpoint::Coordinator, "Accept"));
        assert!(!network.should_drop(Endpoint::Participant(1), Endpoint::Coordinator, "AckCommit"));

        network.clear_drop_rules();
        network.isolate(Endpoint::Participant(1));
        assert!(network.should_drop(Endpoint::Coordinator, Endpoint::Participant(1), "Prepare"));
        network.heal(Endpoint::Participant(1));
        assert!(!network.should_drop(Endpoint::Coordinator, Endpoint::Participant(1), "Prepare"));
    }
}
