//! Vote tracker for the prepare phase.

use std::collections::BTreeMap;
use std::time::Duration;
use twophase_types::{Decision, ParticipantId, Vote};

/// Tracks votes for one transaction.
///
/// There is no quorum: the decision is strict 2PC over whatever has been
/// collected, and a single reject aborts.
#[derive(Debug)]
pub struct VoteTracker {
    /// First vote per participant.
    votes: BTreeMap<ParticipantId, Vote>,
    /// When the window was armed.
    opened_at: Duration,
}

impl VoteTracker {
    /// Create a new vote tracker, opened at `now`.
    pub fn new(now: Duration) -> Self {
        Self {
            votes: BTreeMap::new(),
            opened_at: now,
        }
    }

    /// Get when the window was armed.
    pub fn opened_at(&self) -> Duration {
        self.opened_at
    }

    /// Record a vote. Returns false if the participant already voted; the
    /// first vote stands.
    pub fn add_vote(&mut self, from: ParticipantId, vote: Vote) -> bool {
        if self.votes.contains_key(&from) {
            return false;
        }
        self.votes.insert(from, vote);
        true
    }

    /// Check if `participant` voted.
    pub fn has_voted(&self, participant: &ParticipantId) -> bool {
        self.votes.contains_key(participant)
    }

    /// Aggregate decision over every vote collected so far.
    pub fn decision(&self) -> Decision {
        Decision::from_votes(self.votes.values().copied())
    }

    /// Check if every participant in `targets` has voted.
    ///
    /// Vacuously true for an empty target set.
    pub fn all_voted<'a, I>(&self, targets: I) -> bool
    where
        I: IntoIterator<Item = &'a ParticipantId>,
    {
        targets.into_iter().all(|target| self.has_voted(target))
    }

    /// Number of rejects collected.
    pub fn reject_count(&self) -> usize {
        self.votes.values().filter(|vote| !vote.is_accept()).count()
    }

    /// Number of votes collected.
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    /// Check if no vote has been collected.
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(n: u16) -> ParticipantId {
        ParticipantId::derive(format!("10.0.0.{n}:7000").parse().unwrap())
    }

    #[test]
    fn test_vote_tracker_commit_when_all_accept() {
        let mut tracker = VoteTracker::new(Duration::ZERO);
        let targets = [participant(1), participant(2), participant(3)];

        assert!(tracker.add_vote(participant(1), Vote::Accept));
        assert!(tracker.add_vote(participant(2), Vote::Accept));
        assert!(!tracker.all_voted(&targets));

        assert!(tracker.add_vote(participant(3), Vote::Accept));
        assert!(tracker.all_voted(&targets));
        assert_eq!(tracker.decision(), Decision::Commit);
        assert_eq!(tracker.reject_count(), 0);
    }

    #[test]
    fn test_vote_tracker_single_reject_aborts() {
        let mut tracker = VoteTracker::new(Duration::ZERO);

        tracker.add_vote(participant(1), Vote::Accept);
        tracker.add_vote(participant(2), Vote::Reject);
        tracker.add_vote(participant(3), Vote::Accept);

        assert_eq!(tracker.decision(), Decision::Abort);
        assert_eq!(tracker.reject_count(), 1);
    }

    #[test]
    fn test_vote_tracker_first_vote_stands() {
        let mut tracker = VoteTracker::new(Duration::ZERO);

        assert!(tracker.add_vote(participant(1), Vote::Accept));
        assert!(!tracker.add_vote(participant(1), Vote::Reject));

        assert_eq!(tracker.decision(), Decision::Commit);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_vote_tracker_empty_targets() {
        let tracker = VoteTracker::new(Duration::ZERO);
        assert!(tracker.is_empty());
        assert!(tracker.all_voted(&Vec::<ParticipantId>::new()));
        assert_eq!(tracker.decision(), Decision::Commit);
    }
}
