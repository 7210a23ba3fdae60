//! Inbound events.

use crate::TimerId;
use std::net::SocketAddr;
use twophase_messages::{CoordinatorRequest, ParticipantRequest};
use twophase_types::{ClientEndpoint, Dataset, Decision, ParticipantId, TransactionMessage, Vote};

/// Everything a state machine reacts to.
///
/// Network requests are converted into events by the runner; timers and
/// handle resolution come back as events too.
#[derive(Debug, Clone)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════
    /// The runner finished bootstrapping this node.
    Started,

    /// A timer armed with `Action::SetTimer` expired.
    TimerFired(TimerId),

    // ═══════════════════════════════════════════════════════════════════════
    // Coordinator inputs
    // ═══════════════════════════════════════════════════════════════════════
    /// A participant asks for a 2PC round on `message`.
    RequirePrepare {
        from: ParticipantId,
        message: TransactionMessage,
    },

    /// A participant voted on `message`.
    VoteReceived {
        from: ParticipantId,
        message: TransactionMessage,
        vote: Vote,
    },

    /// A participant acknowledged the decision for `message`.
    AckReceived {
        from: ParticipantId,
        message: TransactionMessage,
        decision: Decision,
    },

    /// A participant asked to join the membership.
    RegisterRequested {
        participant_id: ParticipantId,
        address: SocketAddr,
    },

    /// The runner reached the participant at `address` and it reported
    /// `participant_id`.
    ParticipantResolved {
        participant_id: ParticipantId,
        address: SocketAddr,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Participant inputs
    // ═══════════════════════════════════════════════════════════════════════
    /// A client asked this replica to run a write.
    ClientWrite {
        message: TransactionMessage,
        client: ClientEndpoint,
    },

    /// The coordinator asks for a vote.
    PrepareRequested { message: TransactionMessage },

    /// The coordinator decided the transaction.
    DecisionReceived {
        message: TransactionMessage,
        decision: Decision,
    },

    /// The coordinator pushes its backup log.
    SyncRequested { dataset: Dataset },
}

impl Event {
    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::Started => "Started",
            Event::TimerFired(_) => "TimerFired",
            Event::RequirePrepare { .. } => "RequirePrepare",
            Event::VoteReceived { .. } => "VoteReceived",
            Event::AckReceived { .. } => "AckReceived",
            Event::RegisterRequested { .. } => "RegisterRequested",
            Event::ParticipantResolved { .. } => "ParticipantResolved",
            Event::ClientWrite { .. } => "ClientWrite",
            Event::PrepareRequested { .. } => "PrepareRequested",
            Event::DecisionReceived { .. } => "DecisionReceived",
            Event::SyncRequested { .. } => "SyncRequested",
        }
    }

    /// Convert a request received by the participant service.
    ///
    /// Returns `None` for requests answered directly by the runner
    /// (`Get`, `GetParticipantId`).
    pub fn from_participant_request(request: ParticipantRequest) -> Option<Self> {
        match request {
            ParticipantRequest::Put { message, client }
            | ParticipantRequest::Delete { message, client } => {
                Some(Event::ClientWrite { message, client })
            }
            ParticipantRequest::Prepare { message } => Some(Event::PrepareRequested { message }),
            ParticipantRequest::Commit { message } => Some(Event::DecisionReceived {
                message,
                decision: Decision::Commit,
            }),
            ParticipantRequest::Abort { message } => Some(Event::DecisionReceived {
                message,
                decision: Decision::Abort,
            }),
            ParticipantRequest::Sync { dataset } => Some(Event::SyncRequested { dataset }),
            ParticipantRequest::Get { .. } | ParticipantRequest::GetParticipantId => None,
        }
    }
}

impl From<CoordinatorRequest> for Event {
    fn from(request: CoordinatorRequest) -> Self {
        match request {
            CoordinatorRequest::RequirePrepare {
                participant_id,
                message,
            } => Event::RequirePrepare {
                from: participant_id,
                message,
            },
            CoordinatorRequest::Accept {
                participant_id,
                message,
            } => Event::VoteReceived {
                from: participant_id,
                message,
                vote: Vote::Accept,
            },
            CoordinatorRequest::Reject {
                participant_id,
                message,
            } => Event::VoteReceived {
                from: participant_id,
                message,
                vote: Vote::Reject,
            },
            CoordinatorRequest::AckCommit {
                participant_id,
                message,
            } => Event::AckReceived {
                from: participant_id,
                message,
                decision: Decision::Commit,
            },
            CoordinatorRequest::AckAbort {
                participant_id,
                message,
            } => Event::AckReceived {
                from: participant_id,
                message,
                decision: Decision::Abort,
            },
            CoordinatorRequest::Register {
                participant_id,
                address,
            } => Event::RegisterRequested {
                participant_id,
                address,
            },
        }
    }
}
