//! Production runtime for the coordinator, participants and clients.
//!
//! # Architecture
//!
//! ```text
//! TCP listener ──► Service ──► mpsc ──► Runner ──► StateMachine
//!                     │                   │
//!                     │ (reads)           └──► actions: TCP calls, timers
//!                     ▼
//!                 Arc<KvStore>
//! ```
//!
//! Each process runs one state machine on one task. Listeners answer reads
//! directly and queue everything else as events.

pub mod client;
pub mod config;
pub mod network;
pub mod runner;
pub mod services;
pub mod telemetry;

pub use client::{Command, CommandError, DeliveredResult, PendingRequest, ResultMonitor};
pub use config::{ConfigFileError, FileConfig};
pub use network::{serve, Service, Transport, TransportConfig, TransportError};
pub use runner::Runner;
pub use services::{ClientService, CoordinatorService, ParticipantService};
