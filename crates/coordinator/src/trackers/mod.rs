//! Tracker types for per-transaction 2PC rounds.
//!
//! These trackers hold what one transaction has collected so far in each
//! phase of the protocol.

mod ack;
mod vote;

pub use ack::AckTracker;
pub use vote::VoteTracker;
