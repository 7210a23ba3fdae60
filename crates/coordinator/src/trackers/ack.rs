//! Ack tracker for the decision phase.

use std::collections::BTreeSet;
use std::time::Duration;
use twophase_types::{Decision, ParticipantId};

/// Tracks acknowledgements of one transaction's decision.
#[derive(Debug)]
pub struct AckTracker {
    /// Decision the acks are expected to confirm.
    decision: Decision,
    /// Participants that acked.
    acked: BTreeSet<ParticipantId>,
    /// When the window was armed.
    opened_at: Duration,
}

impl AckTracker {
    /// Create a new ack tracker, opened at `now`.
    pub fn new(decision: Decision, now: Duration) -> Self {
        Self {
            decision,
            acked: BTreeSet::new(),
            opened_at: now,
        }
    }

    /// Get the decision being acknowledged.
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Get when the window was armed.
    pub fn opened_at(&self) -> Duration {
        self.opened_at
    }

    /// Record an ack. Returns false for a duplicate.
    pub fn add_ack(&mut self, from: ParticipantId) -> bool {
        self.acked.insert(from)
    }

    /// Check if `participant` acked.
    pub fn has_acked(&self, participant: &ParticipantId) -> bool {
        self.acked.contains(participant)
    }

    /// Participants in `expected` that have not acked, in iteration order.
    pub fn missing<'a, I>(&self, expected: I) -> Vec<ParticipantId>
    where
        I: IntoIterator<Item = &'a ParticipantId>,
    {
        expected
            .into_iter()
            .filter(|participant| !self.acked.contains(*participant))
            .cloned()
            .collect()
    }

    /// Number of acks collected.
    pub fn len(&self) -> usize {
        self.acked.len()
    }

    /// Check if no ack has been collected.
    pub fn is_empty(&self) -> bool {
        self.acked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(n: u16) -> ParticipantId {
        ParticipantId::derive(format!("10.0.0.{n}:7000").parse().unwrap())
    }

    #[test]
    fn test_missing_acks() {
        let mut tracker =
            AckTracker::new(Decision::Commit, Duration::ZERO);
        let expected = [participant(1), participant(2), participant(3)];

        assert!(tracker.add_ack(participant(1)));
        assert!(tracker.add_ack(participant(3)));
        assert!(!tracker.add_ack(participant(3)));

        assert_eq!(tracker.missing(&expected), vec![participant(2)]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_nothing_missing_when_all_acked() {
        let mut tracker = AckTracker::new(Decision::Abort, Duration::ZERO);
        tracker.add_ack(participant(1));

        assert!(tracker.missing(&[participant(1)]).is_empty());
        assert!(tracker.has_acked(&participant(1)));
        assert_eq!(tracker.decision(), Decision::Abort);
    }
}
