//! Response messages.

use serde::{Deserialize, Serialize};
use twophase_types::ParticipantId;

/// Answer to a [`crate::Request`].
///
/// Most calls in the protocol are one-way notifications and are answered
/// with `Ack` as soon as they are queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// The request was accepted for processing.
    Ack,

    /// Result of a `Get`. `None` means the key is not present.
    Value(Option<String>),

    /// Result of `GetParticipantId`.
    ParticipantId(ParticipantId),

    /// The receiver could not handle the request.
    Error(String),
}

impl Response {
    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}
