//! Network messages for the twophase protocol.
//!
//! Three services speak over the wire:
//!
//! - the participant service (client requests and coordinator commands),
//! - the coordinator service (votes, acks, registration),
//! - the client callback service (final transaction results).
//!
//! Every call is a [`Request`] answered by exactly one [`Response`].

pub mod request;
mod response;

pub use request::{ClientCallback, CoordinatorRequest, ParticipantRequest, Request};
pub use response::Response;
