//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of one client-initiated transaction.
///
/// The message id is the only identity a [`crate::TransactionMessage`] has:
/// two messages with the same id are the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Generate a fresh random message id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a message id from a raw `u128`.
    ///
    /// Deterministic; used by the simulation so that runs are reproducible.
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a client process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Generate a fresh random client id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a client id from a raw `u128`.
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

/// Errors parsing a [`ParticipantId`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParticipantIdError {
    #[error("invalid participant id length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("participant id must be uppercase hex")]
    InvalidHex,
}

/// Stable participant identifier.
///
/// Derived from the participant's network identity so that a restarted
/// replica listening on the same address comes back with the same id.
/// Rendered as 32 uppercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Length of the textual form.
    pub const LEN: usize = 32;

    /// Derive the id for a participant reachable at `addr`.
    ///
    /// Blake3 of `"ip:port"`, truncated to 16 bytes.
    pub fn derive(addr: SocketAddr) -> Self {
        let digest = blake3::hash(addr.to_string().as_bytes());
        Self(hex::encode_upper(&digest.as_bytes()[..Self::LEN / 2]))
    }

    /// Get the textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ParticipantIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl FromStr for ParticipantId {
    type Err = ParticipantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::LEN {
            return Err(ParticipantIdError::InvalidLength {
                expected: Self::LEN,
                actual: s.len(),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        {
            return Err(ParticipantIdError::InvalidHex);
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network location a participant pushes a client's result back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientEndpoint {
    /// The client that issued the request.
    pub client_id: ClientId,
    /// Where the client's callback service listens.
    pub addr: SocketAddr,
}

impl ClientEndpoint {
    /// Create a new client endpoint.
    pub fn new(client_id: ClientId, addr: SocketAddr) -> Self {
        Self { client_id, addr }
    }
}

impl fmt::Display for ClientEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.client_id, self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_participant_id_is_stable_per_address() {
        let a = ParticipantId::derive(addr("127.0.0.1:7001"));
        let b = ParticipantId::derive(addr("127.0.0.1:7001"));
        let c = ParticipantId::derive(addr("127.0.0.1:7002"));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_participant_id_format() {
        let id = ParticipantId::derive(addr("10.0.0.1:9000"));
        assert_eq!(id.as_str().len(), ParticipantId::LEN);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_participant_id_parse() {
        let id = ParticipantId::derive(addr("10.0.0.1:9000"));
        let parsed: ParticipantId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);

        assert_eq!(
            "ABC".parse::<ParticipantId>(),
            Err(ParticipantIdError::InvalidLength {
                expected: 32,
                actual: 3
            })
        );
        let lower = id.as_str().to_lowercase();
        if lower != id.as_str() {
            assert_eq!(
                lower.parse::<ParticipantId>(),
                Err(ParticipantIdError::InvalidHex)
            );
        }
    }

    #[test]
    fn test_message_id_from_u128_is_deterministic() {
        assert_eq!(MessageId::from_u128(7), MessageId::from_u128(7));
        assert_ne!(MessageId::from_u128(7), MessageId::from_u128(8));
        assert_ne!(MessageId::random(), MessageId::random());
    }
}
