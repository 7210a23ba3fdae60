//! Calls served by a participant replica.

use serde::{Deserialize, Serialize};
use twophase_types::{ClientEndpoint, ClientId, Dataset, TransactionMessage};

/// Requests a participant answers.
///
/// `Get`, `Put`, `Delete` and `GetParticipantId` come from clients; the rest
/// come from the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRequest {
    // ═══════════════════════════════════════════════════════════════════════
    // Client-facing
    // ═══════════════════════════════════════════════════════════════════════
    /// Local read, no coordination.
    Get { client_id: ClientId, key: String },

    /// Start a PUT transaction; the result is pushed to `client` later.
    Put {
        message: TransactionMessage,
        client: ClientEndpoint,
    },

    /// Start a DELETE transaction; the result is pushed to `client` later.
    Delete {
        message: TransactionMessage,
        client: ClientEndpoint,
    },

    /// Ask the replica for its stable identifier.
    GetParticipantId,

    // ═══════════════════════════════════════════════════════════════════════
    // Coordinator-facing
    // ═══════════════════════════════════════════════════════════════════════
    /// Phase 1: vote on the message.
    Prepare { message: TransactionMessage },

    /// Phase 2: apply the message.
    Commit { message: TransactionMessage },

    /// Phase 2: drop the message.
    Abort { message: TransactionMessage },

    /// Merge the coordinator's backup log into the local store.
    Sync { dataset: Dataset },
}

impl ParticipantRequest {
    /// Get a human-readable name for this request type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParticipantRequest::Get { .. } => "Get",
            ParticipantRequest::Put { .. } => "Put",
            ParticipantRequest::Delete { .. } => "Delete",
            ParticipantRequest::GetParticipantId => "GetParticipantId",
            ParticipantRequest::Prepare { .. } => "Prepare",
            ParticipantRequest::Commit { .. } => "Commit",
            ParticipantRequest::Abort { .. } => "Abort",
            ParticipantRequest::Sync { .. } => "Sync",
        }
    }

    /// Check if this request is sent by the coordinator.
    pub fn is_from_coordinator(&self) -> bool {
        matches!(
            self,
            ParticipantRequest::Prepare { .. }
                | ParticipantRequest::Commit { .. }
                | ParticipantRequest::Abort { .. }
                | ParticipantRequest::Sync { .. }
        )
    }

    /// Get the transaction message carried by this request, if any.
    pub fn message(&self) -> Option<&TransactionMessage> {
        match self {
            ParticipantRequest::Put { message, .. }
            | ParticipantRequest::Delete { message, .. }
            | ParticipantRequest::Prepare { message }
            | ParticipantRequest::Commit { message }
            | ParticipantRequest::Abort { message } => Some(message),
            ParticipantRequest::Get { .. }
            | ParticipantRequest::GetParticipantId
            | ParticipantRequest::Sync { .. } => None,
        }
    }
}
