//! Two-phase commit participant state machine.
//!
//! A participant holds one full replica of the store. Client writes are
//! forwarded to the coordinator and never applied directly; the replica only
//! changes on `Commit` or `Sync`.
//!
//! # Flow
//!
//! - `Event::Started` → register with the coordinator
//! - `Event::ClientWrite` → remember the client, ask for a 2PC round
//! - `Event::PrepareRequested` → vote by the legality rule
//! - `Event::DecisionReceived` → apply (commit only), ack, notify the client
//! - `Event::SyncRequested` → merge the coordinator's backup log
//! - `TimerId::PendingClient` fires → forget a client whose write was never
//!   decided

mod outcome;
mod state;

pub use outcome::{is_legal, result_text};
pub use state::{ParticipantState, DEFAULT_PENDING_TIMEOUT};
