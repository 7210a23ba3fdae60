//! Request messages, grouped by the service that receives them.

mod client;
mod coordinator;
mod participant;

pub use client::ClientCallback;
pub use coordinator::CoordinatorRequest;
pub use participant::ParticipantRequest;

use serde::{Deserialize, Serialize};

/// Envelope for anything sent over a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service", content = "call", rename_all = "snake_case")]
pub enum Request {
    Participant(ParticipantRequest),
    Coordinator(CoordinatorRequest),
    Client(ClientCallback),
}

impl Request {
    /// Get a human-readable name for this request type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Participant(request) => request.type_name(),
            Request::Coordinator(request) => request.type_name(),
            Request::Client(request) => request.type_name(),
        }
    }
}

impl From<ParticipantRequest> for Request {
    fn from(request: ParticipantRequest) -> Self {
        Request::Participant(request)
    }
}

impl From<CoordinatorRequest> for Request {
    fn from(request: CoordinatorRequest) -> Self {
        Request::Coordinator(request)
    }
}

impl From<ClientCallback> for Request {
    fn from(request: ClientCallback) -> Self {
        Request::Client(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twophase_types::{ClientId, MessageId, ParticipantId, TransactionMessage};

    #[test]
    fn test_envelope_wire_shape() {
        let participant_id = ParticipantId::derive("10.0.0.1:7000".parse().unwrap());
        let message =
            TransactionMessage::put(MessageId::from_u128(5), "a", "1", ClientId::from_u128(2));
        let request: Request = CoordinatorRequest::Accept {
            participant_id,
            message,
        }
        .into();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["service"], "coordinator");
        assert!(json["call"]["accept"]["message"]["key"] == "a");

        let decoded: Request = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.type_name(), "Accept");
    }

    #[test]
    fn test_invalid_participant_id_rejected_on_decode() {
        let json = serde_json::json!({
            "service": "coordinator",
            "call": { "register": { "participant_id": "nope", "address": "127.0.0.1:1" } }
        });
        assert!(serde_json::from_value::<Request>(json).is_err());
    }
}
