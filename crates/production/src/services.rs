//! Network-facing services for each role.

use crate::client::{DeliveredResult, ResultMonitor};
use crate::network::Service;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use twophase_core::Event;
use twophase_messages::{ClientCallback, ParticipantRequest, Request, Response};
use twophase_types::{KvStore, ParticipantId};

fn wrong_service(request: &Request, role: &str) -> Response {
    warn!(kind = request.type_name(), role, "Request sent to the wrong service");
    Response::Error(format!("{} is not served by the {role}", request.type_name()))
}

async fn enqueue(events: &mpsc::Sender<Event>, event: Event) -> Response {
    match events.send(event).await {
        Ok(()) => Response::Ack,
        Err(_) => Response::Error("node is shutting down".into()),
    }
}

/// Coordinator listener: every call becomes an event.
pub struct CoordinatorService {
    events: mpsc::Sender<Event>,
}

impl CoordinatorService {
    pub fn new(events: mpsc::Sender<Event>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Service for CoordinatorService {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Coordinator(request) => enqueue(&self.events, Event::from(request)).await,
            other => wrong_service(&other, "coordinator"),
        }
    }
}

/// Participant listener.
///
/// Reads and id lookups are answered here from the shared replica; protocol
/// calls are queued for the state machine.
pub struct ParticipantService {
    id: ParticipantId,
    store: Arc<KvStore>,
    events: mpsc::Sender<Event>,
}

impl ParticipantService {
    pub fn new(id: ParticipantId, store: Arc<KvStore>, events: mpsc::Sender<Event>) -> Self {
        Self { id, store, events }
    }
}

#[async_trait]
impl Service for ParticipantService {
    async fn handle(&self, request: Request) -> Response {
        let request = match request {
            Request::Participant(request) => request,
            other => return wrong_service(&other, "participant"),
        };
        match request {
            ParticipantRequest::Get { client_id, key } => {
                let value = self.store.get(&key);
                debug!(%client_id, %key, found = value.is_some(), "Get");
                Response::Value(value)
            }
            ParticipantRequest::GetParticipantId => Response::ParticipantId(self.id.clone()),
            other => match Event::from_participant_request(other) {
                Some(event) => enqueue(&self.events, event).await,
                None => Response::Error("unsupported request".into()),
            },
        }
    }
}

/// Client callback listener.
pub struct ClientService {
    monitor: Arc<ResultMonitor>,
    results: mpsc::UnboundedSender<DeliveredResult>,
}

impl ClientService {
    pub fn new(monitor: Arc<ResultMonitor>, results: mpsc::UnboundedSender<DeliveredResult>) -> Self {
        Self { monitor, results }
    }
}

#[async_trait]
impl Service for ClientService {
    async fn handle(&self, request: Request) -> Response {
        let ClientCallback::DeliverResult {
            participant_id,
            result,
            message,
        } = match request {
            Request::Client(callback) => callback,
            other => return wrong_service(&other, "client"),
        };

        let pending = self.monitor.complete(message.id());
        if pending.is_none() {
            debug!(tx = %message.id(), "Result for unknown or expired request");
        }
        let delivered = DeliveredResult {
            participant_id,
            result,
            message_id: message.id(),
            pending,
        };
        if self.results.send(delivered).is_err() {
            debug!("Result printer stopped");
        }
        Response::Ack
    }
}
