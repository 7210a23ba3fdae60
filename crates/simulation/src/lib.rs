//! Deterministic simulation runner.
//!
//! This crate runs one coordinator, any number of participants and any
//! number of clients in a single thread against a simulated network. Given
//! the same seed, it produces identical results every run.
//!
//! # Event ordering
//!
//! Pending deliveries live in a `BTreeMap<EventKey, Delivery>`. Keys sort by
//! delivery time, then priority (timers before network traffic before
//! lifecycle events), then target endpoint, then insertion sequence, so
//! simultaneous events always run in the same order. Every message sent by
//! a state machine goes through [`SimulatedNetwork`], which samples a seeded
//! latency and applies drop rules.

mod event_queue;
mod network;
mod runner;

pub use event_queue::{Delivery, Endpoint, EventKey, EventPriority};
pub use network::{DropRule, NetworkConfig, SimulatedNetwork};
pub use runner::{ClientResult, DecisionRecord, SentMessage, SimulationRunner, SimulationStats};

/// Position of a participant or client in the runner.
///
/// Only the simulation uses indices; real processes address each other by
/// socket address.
pub type NodeIndex = u32;
