//! Timer identifiers.

use std::fmt;
use twophase_types::{MessageId, ParticipantId};

/// Identifies a timer armed via [`crate::Action::SetTimer`].
///
/// Windows are keyed by transaction so concurrent transactions never share
/// a timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerId {
    /// Vote collection window for one transaction.
    VoteWindow(MessageId),
    /// Ack collection window for one transaction.
    AckWindow(MessageId),
    /// Closes a transaction whose `Prepare` broadcast drew no vote.
    VoteDeadline(MessageId),
    /// Closes a decided transaction whose decision drew no ack.
    AckDeadline(MessageId),
    /// Settle delay before resynchronizing a rejoined participant.
    Recovery(ParticipantId),
    /// Participant side: forget a client whose write was never decided.
    PendingClient(MessageId),
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerId::VoteWindow(id) => write!(f, "vote-window({id})"),
            TimerId::AckWindow(id) => write!(f, "ack-window({id})"),
            TimerId::VoteDeadline(id) => write!(f, "vote-deadline({id})"),
            TimerId::AckDeadline(id) => write!(f, "ack-deadline({id})"),
            TimerId::Recovery(participant) => write!(f, "recovery({})", participant.short()),
            TimerId::PendingClient(id) => write!(f, "pending-client({id})"),
        }
    }
}
