//! Two-phase commit coordinator state machine.
//!
//! The coordinator owns the membership, one [`TransactionContext`] per
//! in-flight transaction, the crashed set and the backup log used to
//! resynchronize participants that come back.
//!
//! # Protocol
//!
//! - `Event::RequirePrepare` → snapshot the membership, broadcast `Prepare`
//! - `Event::VoteReceived` → record the vote; the first one arms the vote window
//! - `TimerFired(VoteWindow)` → decide (any reject aborts), send `Commit`/`Abort`
//!   to every participant that voted
//! - `Event::AckReceived` → record the ack; the first one arms the ack window
//!   and writes the outcome to the backup log
//! - `TimerFired(AckWindow)` → every prepared participant that did not ack is
//!   marked crashed
//! - `Event::ParticipantResolved` for a crashed participant → recovery timer →
//!   `Sync` with the whole backup log
//!
//! All I/O is performed by the runner via returned `Action`s.

mod backup;
mod config;
mod context;
mod history;
mod recovery;
mod state;
pub mod trackers;

pub use backup::BackupLog;
pub use config::{ConfigError, CoordinatorConfig};
pub use context::{TransactionContext, TransactionPhase};
pub use history::DecidedHistory;
pub use recovery::RecoveryQueue;
pub use state::CoordinatorState;
