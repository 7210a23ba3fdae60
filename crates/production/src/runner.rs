//! Async runner driving one state machine.

use crate::network::{Transport, TransportError};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use twophase_core::{Action, Event, StateMachine};
use twophase_messages::{ParticipantRequest, Request, Response};
use twophase_types::ParticipantId;

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Feeds events to a state machine one at a time and executes its actions.
///
/// Network sends and timers run on their own tasks so the state machine is
/// never blocked by a slow or dead peer. Send failures are logged and
/// dropped; the protocol notices missing peers through its own windows.
pub struct Runner<S> {
    state: S,
    events: mpsc::Receiver<Event>,
    sender: mpsc::Sender<Event>,
    transport: Transport,
    coordinator: Option<SocketAddr>,
    started_at: Instant,
}

impl<S: StateMachine + Send + 'static> Runner<S> {
    /// Create a runner. `coordinator` is where `SendToCoordinator` actions go.
    pub fn new(state: S, transport: Transport, coordinator: Option<SocketAddr>) -> Self {
        let (sender, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state,
            events,
            sender,
            transport,
            coordinator,
            started_at: Instant::now(),
        }
    }

    /// Get a handle for submitting events.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.sender.clone()
    }

    /// Process events for the lifetime of the process.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            let kind = event.type_name();
            self.state.set_time(self.started_at.elapsed());
            let actions = self.state.handle(event);
            trace!(event = kind, actions = actions.len(), "Event handled");
            for action in actions {
                self.execute(action);
            }
        }
    }

    fn execute(&self, action: Action) {
        match action {
            Action::SendToParticipant {
                participant_id,
                address,
                request,
            } => {
                let transport = self.transport.clone();
                tokio::spawn(async move {
                    let kind = request.type_name();
                    if let Err(e) = transport.request(address, &Request::from(request)).await {
                        warn!(participant = participant_id.short(), %address, kind, error = %e, "Participant unreachable");
                    }
                });
            }

            Action::SendToCoordinator(request) => {
                let Some(coordinator) = self.coordinator else {
                    warn!(kind = request.type_name(), "No coordinator configured, dropping request");
                    return;
                };
                let transport = self.transport.clone();
                tokio::spawn(async move {
                    let kind = request.type_name();
                    if let Err(e) = transport.request(coordinator, &Request::from(request)).await {
                        warn!(%coordinator, kind, error = %e, "Coordinator unreachable");
                    }
                });
            }

            Action::DeliverResult { client, callback } => {
                let transport = self.transport.clone();
                tokio::spawn(async move {
                    if let Err(e) = transport.request(client.addr, &Request::from(callback)).await {
                        warn!(%client, error = %e, "Client unreachable, result lost");
                    }
                });
            }

            Action::ResolveParticipant {
                participant_id,
                address,
            } => {
                let transport = self.transport.clone();
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    match resolve(&transport, address).await {
                        Ok(reported) if reported == participant_id => {
                            let event = Event::ParticipantResolved {
                                participant_id,
                                address,
                            };
                            if sender.send(event).await.is_err() {
                                debug!("Runner stopped before participant resolved");
                            }
                        }
                        Ok(reported) => warn!(
                            %address,
                            claimed = participant_id.short(),
                            reported = reported.short(),
                            "Participant id mismatch, registration ignored"
                        ),
                        Err(e) => warn!(%address, error = %e, "Cannot reach registering participant"),
                    }
                });
            }

            Action::SetTimer { id, duration } => {
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    if sender.send(Event::TimerFired(id)).await.is_err() {
                        debug!("Runner stopped before timer fired");
                    }
                });
            }

            Action::EmitDecision {
                message,
                decision,
                recipients,
            } => {
                info!(tx = %message.id(), key = message.key(), %decision, recipients = recipients.len(), "Decision sent");
            }
        }
    }
}

/// Ask the service at `address` for its participant id.
async fn resolve(transport: &Transport, address: SocketAddr) -> Result<ParticipantId, TransportError> {
    let request = Request::from(ParticipantRequest::GetParticipantId);
    match transport.request(address, &request).await? {
        Response::ParticipantId(id) => Ok(id),
        other => Err(TransportError::Remote(format!("unexpected response {other:?}"))),
    }
}
