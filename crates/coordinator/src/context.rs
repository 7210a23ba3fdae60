//! Per-transaction coordinator state.

use crate::trackers::{AckTracker, VoteTracker};
use std::time::Duration;
use twophase_types::{Decision, ParticipantId, TransactionMessage};

/// Where a transaction is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// `Prepare` broadcast, no vote yet.
    Preparing,
    /// Vote window armed.
    Voting,
    /// Decision sent, no ack yet.
    AwaitingAcks,
    /// Ack window armed.
    CollectingAcks,
}

/// Everything the coordinator knows about one in-flight transaction.
///
/// Owned by [`crate::CoordinatorState`] and keyed by message id, so
/// concurrent transactions never share tallies or timers.
#[derive(Debug)]
pub struct TransactionContext {
    /// The transaction.
    message: TransactionMessage,
    /// Participant that asked for the round, if the request was seen.
    requested_by: Option<ParticipantId>,
    /// Membership snapshot taken when `Prepare` was broadcast.
    targets: Vec<ParticipantId>,
    /// Vote window, present once the first vote arrived.
    pub(crate) votes: Option<VoteTracker>,
    /// Decision and the participants it was sent to.
    pub(crate) outcome: Option<(Decision, Vec<ParticipantId>)>,
    /// Ack window, present once the first ack arrived.
    pub(crate) acks: Option<AckTracker>,
    /// When the context was created.
    created_at: Duration,
}

impl TransactionContext {
    /// Create a context for a transaction prepared against `targets`.
    pub fn new(
        message: TransactionMessage,
        requested_by: Option<ParticipantId>,
        targets: Vec<ParticipantId>,
        now: Duration,
    ) -> Self {
        Self {
            message,
            requested_by,
            targets,
            votes: None,
            outcome: None,
            acks: None,
            created_at: now,
        }
    }

    /// Get the transaction message.
    pub fn message(&self) -> &TransactionMessage {
        &self.message
    }

    /// Get the participant that asked for the round.
    pub fn requested_by(&self) -> Option<&ParticipantId> {
        self.requested_by.as_ref()
    }

    /// Get the participants `Prepare` was sent to.
    pub fn targets(&self) -> &[ParticipantId] {
        &self.targets
    }

    /// Check if `participant` is part of this transaction.
    pub fn is_target(&self, participant: &ParticipantId) -> bool {
        self.targets.contains(participant)
    }

    /// Get the vote tracker, if the vote window is open.
    pub fn votes(&self) -> Option<&VoteTracker> {
        self.votes.as_ref()
    }

    /// Get the ack tracker, if the ack window is open.
    pub fn acks(&self) -> Option<&AckTracker> {
        self.acks.as_ref()
    }

    /// Get the decision, once the vote window closed.
    pub fn decision(&self) -> Option<Decision> {
        self.outcome.as_ref().map(|(decision, _)| *decision)
    }

    /// Get the participants the decision was sent to.
    pub fn recipients(&self) -> &[ParticipantId] {
        self.outcome
            .as_ref()
            .map(|(_, recipients)| recipients.as_slice())
            .unwrap_or(&[])
    }

    /// Get when the context was created.
    pub fn created_at(&self) -> Duration {
        self.created_at
    }

    /// Current phase.
    pub fn phase(&self) -> TransactionPhase {
        if self.acks.is_some() {
            TransactionPhase::CollectingAcks
        } else if self.outcome.is_some() {
            TransactionPhase::AwaitingAcks
        } else if self.votes.is_some() {
            TransactionPhase::Voting
        } else {
            TransactionPhase::Preparing
        }
    }

    /// Check if the vote window can still take votes.
    pub fn accepts_votes(&self) -> bool {
        self.outcome.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twophase_types::{ClientId, MessageId, Vote};

    #[test]
    fn test_phase_progression() {
        let message =
            TransactionMessage::put(MessageId::from_u128(1), "a", "1", ClientId::from_u128(1));
        let target = ParticipantId::derive("10.0.0.1:7000".parse().unwrap());
        let mut ctx =
            TransactionContext::new(message.clone(), None, vec![target.clone()], Duration::ZERO);
        assert_eq!(ctx.phase(), TransactionPhase::Preparing);
        assert!(ctx.is_target(&target));

        let mut votes = VoteTracker::new(Duration::ZERO);
        votes.add_vote(target.clone(), Vote::Accept);
        ctx.votes = Some(votes);
        assert_eq!(ctx.phase(), TransactionPhase::Voting);
        assert!(ctx.accepts_votes());

        ctx.outcome = Some((Decision::Commit, vec![target.clone()]));
        assert_eq!(ctx.phase(), TransactionPhase::AwaitingAcks);
        assert!(!ctx.accepts_votes());
        assert_eq!(ctx.recipients(), &[target]);

        ctx.acks = Some(AckTracker::new(Decision::Commit, Duration::from_secs(1)));
        assert_eq!(ctx.phase(), TransactionPhase::CollectingAcks);
    }
}
