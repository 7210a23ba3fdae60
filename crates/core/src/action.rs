//! Outbound actions.

use crate::TimerId;
use std::net::SocketAddr;
use std::time::Duration;
use twophase_messages::{ClientCallback, CoordinatorRequest, ParticipantRequest};
use twophase_types::{ClientEndpoint, Decision, ParticipantId, TransactionMessage};

/// Side effects a state machine asks its runner to perform.
///
/// Every send is fire-and-forget: the runner logs failures and never feeds
/// them back. A silent peer is only ever detected by a window timer.
#[derive(Debug, Clone)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Network
    // ═══════════════════════════════════════════════════════════════════════
    /// Send a request to a participant's service.
    SendToParticipant {
        participant_id: ParticipantId,
        address: SocketAddr,
        request: ParticipantRequest,
    },

    /// Send a request to the coordinator.
    SendToCoordinator(CoordinatorRequest),

    /// Push a transaction result to a client's callback service.
    DeliverResult {
        client: ClientEndpoint,
        callback: ClientCallback,
    },

    /// Dial `address`, ask for its participant id and report back with
    /// `Event::ParticipantResolved` if it matches `participant_id`.
    ResolveParticipant {
        participant_id: ParticipantId,
        address: SocketAddr,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// Fire `Event::TimerFired(id)` after `duration`.
    SetTimer { id: TimerId, duration: Duration },

    // ═══════════════════════════════════════════════════════════════════════
    // Notifications
    // ═══════════════════════════════════════════════════════════════════════
    /// A vote window closed with `decision`, sent to `recipients`.
    EmitDecision {
        message: TransactionMessage,
        decision: Decision,
        recipients: Vec<ParticipantId>,
    },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SendToParticipant { .. } => "SendToParticipant",
            Action::SendToCoordinator(_) => "SendToCoordinator",
            Action::DeliverResult { .. } => "DeliverResult",
            Action::ResolveParticipant { .. } => "ResolveParticipant",
            Action::SetTimer { .. } => "SetTimer",
            Action::EmitDecision { .. } => "EmitDecision",
        }
    }

    /// Check if this action performs network I/O.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Action::SendToParticipant { .. }
                | Action::SendToCoordinator(_)
                | Action::DeliverResult { .. }
                | Action::ResolveParticipant { .. }
        )
    }
}
