//! Calls served by a client's callback service.

use serde::{Deserialize, Serialize};
use twophase_types::{ParticipantId, TransactionMessage};

/// Pushed by the participant that received the client's write once the
/// transaction has been decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCallback {
    DeliverResult {
        participant_id: ParticipantId,
        result: String,
        message: TransactionMessage,
    },
}

impl ClientCallback {
    /// Get a human-readable name for this request type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientCallback::DeliverResult { .. } => "DeliverResult",
        }
    }
}
