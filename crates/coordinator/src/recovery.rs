//! Reconciliation queue for participants rejoining after a crash.

use std::collections::BTreeMap;
use std::time::Duration;
use twophase_types::ParticipantId;

/// Pending resynchronizations, one per participant.
///
/// Filled by registration events, drained by recovery timers. Crash
/// detection never touches it.
#[derive(Debug, Default)]
pub struct RecoveryQueue {
    /// participant -> time the recovery was scheduled
    pending: BTreeMap<ParticipantId, Duration>,
}

impl RecoveryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a recovery. Returns false if one is already pending, in which
    /// case no new timer should be armed.
    pub fn schedule(&mut self, participant: ParticipantId, now: Duration) -> bool {
        if self.pending.contains_key(&participant) {
            return false;
        }
        self.pending.insert(participant, now);
        true
    }

    /// Take a due recovery. Returns when it was scheduled.
    pub fn take(&mut self, participant: &ParticipantId) -> Option<Duration> {
        self.pending.remove(participant)
    }

    /// Check if a recovery is pending for `participant`.
    pub fn is_pending(&self, participant: &ParticipantId) -> bool {
        self.pending.contains_key(participant)
    }

    /// Number of pending recoveries.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_recovery_per_participant() {
        let mut queue = RecoveryQueue::new();
        let participant = ParticipantId::derive("10.0.0.1:7000".parse().unwrap());

        assert!(queue.schedule(participant.clone(), Duration::from_secs(1)));
        assert!(!queue.schedule(participant.clone(), Duration::from_secs(2)));
        assert!(queue.is_pending(&participant));

        assert_eq!(queue.take(&participant), Some(Duration::from_secs(1)));
        assert!(queue.take(&participant).is_none());
        assert!(queue.is_empty());
    }
}
