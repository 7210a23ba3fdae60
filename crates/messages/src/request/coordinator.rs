//! Calls served by the coordinator.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use twophase_types::{Decision, ParticipantId, TransactionMessage, Vote};

/// Requests the coordinator answers. All of them come from participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorRequest {
    /// A participant received a client write and asks for a 2PC round.
    RequirePrepare {
        participant_id: ParticipantId,
        message: TransactionMessage,
    },

    /// Vote to commit.
    Accept {
        participant_id: ParticipantId,
        message: TransactionMessage,
    },

    /// Vote to abort.
    Reject {
        participant_id: ParticipantId,
        message: TransactionMessage,
    },

    /// The participant applied the message.
    AckCommit {
        participant_id: ParticipantId,
        message: TransactionMessage,
    },

    /// The participant dropped the message.
    AckAbort {
        participant_id: ParticipantId,
        message: TransactionMessage,
    },

    /// Join (or rejoin) the membership. `address` is where the participant
    /// service listens.
    Register {
        participant_id: ParticipantId,
        address: SocketAddr,
    },
}

impl CoordinatorRequest {
    /// Build the vote notification matching `vote`.
    pub fn vote(participant_id: ParticipantId, message: TransactionMessage, vote: Vote) -> Self {
        match vote {
            Vote::Accept => CoordinatorRequest::Accept {
                participant_id,
                message,
            },
            Vote::Reject => CoordinatorRequest::Reject {
                participant_id,
                message,
            },
        }
    }

    /// Build the acknowledgement matching `decision`.
    pub fn ack(
        participant_id: ParticipantId,
        message: TransactionMessage,
        decision: Decision,
    ) -> Self {
        match decision {
            Decision::Commit => CoordinatorRequest::AckCommit {
                participant_id,
                message,
            },
            Decision::Abort => CoordinatorRequest::AckAbort {
                participant_id,
                message,
            },
        }
    }

    /// Get a human-readable name for this request type.
    pub fn type_name(&self) -> &'static str {
        match self {
            CoordinatorRequest::RequirePrepare { .. } => "RequirePrepare",
            CoordinatorRequest::Accept { .. } => "Accept",
            CoordinatorRequest::Reject { .. } => "Reject",
            CoordinatorRequest::AckCommit { .. } => "AckCommit",
            CoordinatorRequest::AckAbort { .. } => "AckAbort",
            CoordinatorRequest::Register { .. } => "Register",
        }
    }

    /// Get the participant that sent this request.
    pub fn participant_id(&self) -> &ParticipantId {
        match self {
            CoordinatorRequest::RequirePrepare { participant_id, .. }
            | CoordinatorRequest::Accept { participant_id, .. }
            | CoordinatorRequest::Reject { participant_id, .. }
            | CoordinatorRequest::AckCommit { participant_id, .. }
            | CoordinatorRequest::AckAbort { participant_id, .. }
            | CoordinatorRequest::Register { participant_id, .. } => participant_id,
        }
    }

    /// Get the transaction message carried by this request, if any.
    pub fn message(&self) -> Option<&TransactionMessage> {
        match self {
            CoordinatorRequest::RequirePrepare { message, .. }
            | CoordinatorRequest::Accept { message, .. }
            | CoordinatorRequest::Reject { message, .. }
            | CoordinatorRequest::AckCommit { message, .. }
            | CoordinatorRequest::AckAbort { message, .. } => Some(message),
            CoordinatorRequest::Register { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twophase_types::{ClientId, MessageId};

    fn participant() -> ParticipantId {
        ParticipantId::derive("10.0.0.1:7000".parse().unwrap())
    }

    #[test]
    fn test_vote_builder() {
        let message =
            TransactionMessage::delete(MessageId::from_u128(3), "a", ClientId::from_u128(1));

        let accept = CoordinatorRequest::vote(participant(), message.clone(), Vote::Accept);
        assert_eq!(accept.type_name(), "Accept");

        let reject = CoordinatorRequest::vote(participant(), message, Vote::Reject);
        assert_eq!(reject.type_name(), "Reject");
        assert_eq!(reject.participant_id(), &participant());
    }

    #[test]
    fn test_ack_builder() {
        let message =
            TransactionMessage::delete(MessageId::from_u128(3), "a", ClientId::from_u128(1));

        assert_eq!(
            CoordinatorRequest::ack(participant(), message.clone(), Decision::Commit).type_name(),
            "AckCommit"
        );
        assert_eq!(
            CoordinatorRequest::ack(participant(), message, Decision::Abort).type_name(),
            "AckAbort"
        );
    }
}
