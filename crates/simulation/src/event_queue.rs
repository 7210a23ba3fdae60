//! Ordering of scheduled deliveries.

use crate::NodeIndex;
use std::fmt;
use std::time::Duration;
use twophase_core::Event;
use twophase_messages::ClientCallback;

/// A simulated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Coordinator,
    Participant(NodeIndex),
    Client(NodeIndex),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Coordinator => write!(f, "coordinator"),
            Endpoint::Participant(index) => write!(f, "participant-{index}"),
            Endpoint::Client(index) => write!(f, "client-{index}"),
        }
    }
}

/// Processing order for deliveries scheduled at the same instant.
///
/// Timers run before network traffic so that a window closing at `t` does
/// not see a message that also arrives at `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventPriority {
    Timer = 0,
    Network = 1,
    Lifecycle = 2,
}

impl EventPriority {
    /// Priority for delivering `event`.
    pub fn for_event(event: &Event) -> Self {
        match event {
            Event::TimerFired(_) => EventPriority::Timer,
            Event::Started => EventPriority::Lifecycle,
            _ => EventPriority::Network,
        }
    }
}

/// Key for ordering events in the queue.
///
/// Events are ordered by time, then priority, then endpoint, then insertion
/// sequence. The sequence breaks every remaining tie so that runs are
/// reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub endpoint: Endpoint,
    pub sequence: u64,
}

/// What gets handed to an endpoint when its key comes up.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Input for the coordinator or a participant state machine.
    Event(Event),
    /// A result pushed to a client.
    Callback(ClientCallback),
}

impl Delivery {
    /// Priority for this delivery.
    pub fn priority(&self) -> EventPriority {
        match self {
            Delivery::Event(event) => EventPriority::for_event(event),
            Delivery::Callback(_) => EventPriority::Network,
        }
    }
}
