//! Core types for the twophase key-value store.
//!
//! Everything here is plain data shared by the coordinator, the participants
//! and the runners: identifiers, the transaction message and the in-memory
//! store each replica holds.

mod identifiers;
mod message;
mod store;
mod vote;

pub use identifiers::{ClientEndpoint, ClientId, MessageId, ParticipantId, ParticipantIdError};
pub use message::{Operation, TransactionMessage};
pub use store::{Dataset, KvStore};
pub use vote::{Decision, Vote};
