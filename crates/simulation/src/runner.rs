//! Discrete-event runner driving the coordinator, participants and clients.

use crate::event_queue::{Delivery, Endpoint, EventKey};
use crate::network::{NetworkConfig, SimulatedNetwork};
use crate::NodeIndex;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use twophase_coordinator::{CoordinatorConfig, CoordinatorState};
use twophase_core::{Action, Event, StateMachine};
use twophase_messages::{ClientCallback, ParticipantRequest};
use twophase_participant::ParticipantState;
use twophase_types::{
    ClientEndpoint, ClientId, Decision, MessageId, ParticipantId, TransactionMessage,
};

/// Port every simulated participant listens on.
const PARTICIPANT_PORT: u16 = 7000;

/// Port every simulated client callback service listens on.
const CLIENT_PORT: u16 = 9000;

/// A message handed to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub time: Duration,
    pub from: Endpoint,
    pub to: Endpoint,
    /// Request type name.
    pub kind: &'static str,
    /// Transaction the message belongs to, if any.
    pub message_id: Option<MessageId>,
    /// Lost by a drop rule or isolation.
    pub dropped: bool,
}

/// A result delivered to a simulated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResult {
    pub time: Duration,
    pub participant_id: ParticipantId,
    pub result: String,
    pub message_id: MessageId,
}

/// A decision taken by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRecord {
    pub time: Duration,
    pub message_id: MessageId,
    pub decision: Decision,
    pub recipients: Vec<ParticipantId>,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub events_processed: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub timers_set: u64,
    /// Deliveries that found their participant crashed.
    pub lost_to_crashed: u64,
}

struct ParticipantSlot {
    address: SocketAddr,
    /// `None` while crashed.
    state: Option<ParticipantState>,
}

struct ClientSlot {
    endpoint: ClientEndpoint,
    results: Vec<ClientResult>,
}

/// Deterministic simulation of one coordinator and its participants.
pub struct SimulationRunner {
    queue: BTreeMap<EventKey, Delivery>,
    sequence: u64,
    now: Duration,
    network: SimulatedNetwork,
    coordinator: CoordinatorState,
    participants: Vec<ParticipantSlot>,
    clients: Vec<ClientSlot>,
    next_message: u128,
    sent: Vec<SentMessage>,
    decisions: Vec<DecisionRecord>,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner with no participants and no clients.
    pub fn new(network: NetworkConfig, coordinator: CoordinatorConfig, seed: u64) -> Self {
        Self {
            queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network: SimulatedNetwork::new(network, seed),
            coordinator: CoordinatorState::new(coordinator),
            participants: Vec::new(),
            clients: Vec::new(),
            next_message: 1,
            sent: Vec::new(),
            decisions: Vec::new(),
            stats: SimulationStats::default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Topology
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start a new participant. It registers with the coordinator on its own.
    pub fn add_participant(&mut self) -> NodeIndex {
        let index = self.participants.len() as NodeIndex;
        let address = participant_address(index);
        self.participants.push(ParticipantSlot {
            address,
            state: Some(ParticipantState::new(address)),
        });
        self.schedule(Endpoint::Participant(index), Duration::ZERO, Delivery::Event(Event::Started));
        index
    }

    /// Add a client.
    pub fn add_client(&mut self) -> NodeIndex {
        let index = self.clients.len() as NodeIndex;
        self.clients.push(ClientSlot {
            endpoint: ClientEndpoint::new(
                ClientId::from_u128(u128::from(index) + 1),
                client_address(index),
            ),
            results: Vec::new(),
        });
        index
    }

    /// Crash a participant. Its replica is lost; messages to it are dropped.
    pub fn crash_participant(&mut self, index: NodeIndex) {
        if let Some(slot) = self.participants.get_mut(index as usize) {
            info!(participant = index, "Crashing participant");
            slot.state = None;
        }
    }

    /// Restart a crashed participant with an empty replica on the same address.
    pub fn restart_participant(&mut self, index: NodeIndex) {
        let Some(slot) = self.participants.get_mut(index as usize) else {
            return;
        };
        if slot.state.is_some() {
            warn!(participant = index, "Restart requested for running participant");
            return;
        }
        info!(participant = index, "Restarting participant");
        slot.state = Some(ParticipantState::new(slot.address));
        self.schedule(Endpoint::Participant(index), Duration::ZERO, Delivery::Event(Event::Started));
    }

    /// Have a running participant register again, keeping its replica.
    pub fn reregister_participant(&mut self, index: NodeIndex) {
        if self.is_up(index) {
            self.schedule(Endpoint::Participant(index), Duration::ZERO, Delivery::Event(Event::Started));
        }
    }

    /// Check if a participant is running.
    pub fn is_up(&self, index: NodeIndex) -> bool {
        self.participants
            .get(index as usize)
            .is_some_and(|slot| slot.state.is_some())
    }

    /// Get the id a participant has (derived from its address).
    pub fn participant_id(&self, index: NodeIndex) -> ParticipantId {
        ParticipantId::derive(participant_address(index))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Client operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Have `client` send a PUT to `participant`.
    pub fn submit_put(
        &mut self,
        client: NodeIndex,
        participant: NodeIndex,
        key: &str,
        value: &str,
    ) -> MessageId {
        let id = self.next_message_id();
        let origin = self.client_id(client);
        self.submit(client, participant, TransactionMessage::put(id, key, value, origin))
    }

    /// Have `client` send a DELETE to `participant`.
    pub fn submit_delete(&mut self, client: NodeIndex, participant: NodeIndex, key: &str) -> MessageId {
        let id = self.next_message_id();
        let origin = self.client_id(client);
        self.submit(client, participant, TransactionMessage::delete(id, key, origin))
    }

    /// Read a key from one replica. `None` for a missing key or a crashed
    /// participant.
    pub fn get(&self, participant: NodeIndex, key: &str) -> Option<String> {
        self.participant(participant)?.get(key)
    }

    fn submit(&mut self, client: NodeIndex, participant: NodeIndex, message: TransactionMessage) -> MessageId {
        let id = message.id();
        let Some(endpoint) = self.clients.get(client as usize).map(|slot| slot.endpoint) else {
            warn!(client, "Unknown client");
            return id;
        };
        let request = if message.is_put() {
            ParticipantRequest::Put {
                message,
                client: endpoint,
            }
        } else {
            ParticipantRequest::Delete {
                message,
                client: endpoint,
            }
        };
        self.send_to_participant(Endpoint::Client(client), participant, request);
        id
    }

    fn next_message_id(&mut self) -> MessageId {
        let id = MessageId::from_u128(self.next_message);
        self.next_message += 1;
        id
    }

    fn client_id(&self, client: NodeIndex) -> ClientId {
        self.clients
            .get(client as usize)
            .map(|slot| slot.endpoint.client_id)
            .unwrap_or_else(|| ClientId::from_u128(0))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Get the coordinator.
    pub fn coordinator(&self) -> &CoordinatorState {
        &self.coordinator
    }

    /// Get a running participant.
    pub fn participant(&self, index: NodeIndex) -> Option<&ParticipantState> {
        self.participants.get(index as usize)?.state.as_ref()
    }

    /// Results delivered to `client`, in arrival order.
    pub fn client_results(&self, client: NodeIndex) -> &[ClientResult] {
        self.clients
            .get(client as usize)
            .map(|slot| slot.results.as_slice())
            .unwrap_or(&[])
    }

    /// Every message handed to the network, in send order.
    pub fn sent(&self) -> &[SentMessage] {
        &self.sent
    }

    /// Messages of type `kind` that reached the network towards `to`.
    pub fn delivered_to(&self, to: Endpoint, kind: &str) -> Vec<&SentMessage> {
        self.sent
            .iter()
            .filter(|sent| sent.to == to && sent.kind == kind && !sent.dropped)
            .collect()
    }

    /// Every decision taken, in order.
    pub fn decisions(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    /// Get the decision for one transaction.
    pub fn decision_for(&self, id: MessageId) -> Option<&DecisionRecord> {
        self.decisions.iter().find(|record| record.message_id == id)
    }

    /// Get the run counters.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Get the network for fault injection.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Execution
    // ═══════════════════════════════════════════════════════════════════════════

    /// Process events until the queue is empty or the next event is after
    /// `deadline`. Time is advanced to `deadline` afterwards.
    pub fn run_until(&mut self, deadline: Duration) {
        while let Some(entry) = self.queue.first_entry() {
            if entry.key().time > deadline {
                break;
            }
            let (key, delivery) = entry.remove_entry();
            self.now = key.time;
            self.dispatch(key.endpoint, delivery);
        }
        if self.now < deadline {
            self.now = deadline;
        }
    }

    /// Advance simulated time by `duration`.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.now + duration);
    }

    fn dispatch(&mut self, endpoint: Endpoint, delivery: Delivery) {
        self.stats.events_processed += 1;
        match (endpoint, delivery) {
            (Endpoint::Coordinator, Delivery::Event(event)) => {
                trace!(event = event.type_name(), "coordinator <-");
                self.coordinator.set_time(self.now);
                let actions = self.coordinator.handle(event);
                self.process_actions(Endpoint::Coordinator, actions);
            }
            (Endpoint::Participant(index), Delivery::Event(event)) => {
                let now = self.now;
                let Some(state) = self
                    .participants
                    .get_mut(index as usize)
                    .and_then(|slot| slot.state.as_mut())
                else {
                    debug!(participant = index, event = event.type_name(), "Participant down, event lost");
                    self.stats.lost_to_crashed += 1;
                    return;
                };
                trace!(participant = index, event = event.type_name(), "participant <-");
                state.set_time(now);
                let actions = state.handle(event);
                self.process_actions(Endpoint::Participant(index), actions);
            }
            (Endpoint::Client(index), Delivery::Callback(callback)) => {
                let ClientCallback::DeliverResult {
                    participant_id,
                    result,
                    message,
                } = callback;
                info!(client = index, tx = %message.id(), %result, "Client received result");
                if let Some(slot) = self.clients.get_mut(index as usize) {
                    slot.results.push(ClientResult {
                        time: self.now,
                        participant_id,
                        result,
                        message_id: message.id(),
                    });
                }
            }
            (endpoint, delivery) => {
                warn!(%endpoint, ?delivery, "Delivery does not fit endpoint");
            }
        }
    }

    fn process_actions(&mut self, from: Endpoint, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::SendToParticipant {
                    address, request, ..
                } => match self.participant_at(address) {
                    Some(index) => self.send_to_participant(from, index, request),
                    None => warn!(%address, "No participant at address"),
                },

                Action::SendToCoordinator(request) => {
                    let kind = request.type_name();
                    let message_id = request.message().map(TransactionMessage::id);
                    self.send(from, Endpoint::Coordinator, kind, message_id, Delivery::Event(Event::from(request)));
                }

                Action::DeliverResult { client, callback } => {
                    let Some(index) = self.client_at(client.addr) else {
                        warn!(%client, "No client at address");
                        continue;
                    };
                    let ClientCallback::DeliverResult { message, .. } = &callback;
                    let message_id = Some(message.id());
                    self.send(from, Endpoint::Client(index), callback.type_name(), message_id, Delivery::Callback(callback));
                }

                Action::ResolveParticipant {
                    participant_id,
                    address,
                } => self.resolve(from, participant_id, address),

                Action::SetTimer { id, duration } => {
                    trace!(%from, timer = %id, ?duration, "Timer set");
                    self.stats.timers_set += 1;
                    self.schedule(from, duration, Delivery::Event(Event::TimerFired(id)));
                }

                Action::EmitDecision {
                    message,
                    decision,
                    recipients,
                } => {
                    info!(tx = %message.id(), %decision, recipients = recipients.len(), "Decision");
                    self.decisions.push(DecisionRecord {
                        time: self.now,
                        message_id: message.id(),
                        decision,
                        recipients,
                    });
                }
            }
        }
    }

    /// Dial the participant and ask for its id, like the production runner
    /// does. Succeeds only if both legs get through and the id matches.
    fn resolve(&mut self, from: Endpoint, participant_id: ParticipantId, address: SocketAddr) {
        let Some(index) = self.participant_at(address) else {
            warn!(%address, "Cannot resolve participant: no such address");
            return;
        };
        let to = Endpoint::Participant(index);
        if self.network.should_drop(from, to, "GetParticipantId") || !self.is_up(index) {
            warn!(%address, "Cannot resolve participant: unreachable");
            self.stats.messages_dropped += 1;
            return;
        }
        if self.participant_id(index) != participant_id {
            warn!(%address, claimed = participant_id.short(), "Participant id mismatch");
            return;
        }
        let round_trip = self.network.sample_latency() + self.network.sample_latency();
        self.schedule(
            from,
            round_trip,
            Delivery::Event(Event::ParticipantResolved {
                participant_id,
                address,
            }),
        );
    }

    fn send_to_participant(&mut self, from: Endpoint, index: NodeIndex, request: ParticipantRequest) {
        let kind = request.type_name();
        let message_id = request.message().map(TransactionMessage::id);
        match Event::from_participant_request(request) {
            Some(event) => self.send(from, Endpoint::Participant(index), kind, message_id, Delivery::Event(event)),
            None => debug!(kind, "Request is not a state machine event"),
        }
    }

    fn send(
        &mut self,
        from: Endpoint,
        to: Endpoint,
        kind: &'static str,
        message_id: Option<MessageId>,
        delivery: Delivery,
    ) {
        let dropped = self.network.should_drop(from, to, kind);
        self.sent.push(SentMessage {
            time: self.now,
            from,
            to,
            kind,
            message_id,
            dropped,
        });
        if dropped {
            debug!(%from, %to, kind, "Message dropped");
            self.stats.messages_dropped += 1;
            return;
        }
        self.stats.messages_sent += 1;
        let latency = self.network.sample_latency();
        self.schedule(to, latency, delivery);
    }

    fn schedule(&mut self, endpoint: Endpoint, delay: Duration, delivery: Delivery) {
        let key = EventKey {
            time: self.now + delay,
            priority: delivery.priority(),
            endpoint,
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.queue.insert(key, delivery);
    }

    fn participant_at(&self, address: SocketAddr) -> Option<NodeIndex> {
        self.participants
            .iter()
            .position(|slot| slot.address == address)
            .map(|index| index as NodeIndex)
    }

    fn client_at(&self, address: SocketAddr) -> Option<NodeIndex> {
        self.clients
            .iter()
            .position(|slot| slot.endpoint.addr == address)
            .map(|index| index as NodeIndex)
    }
}

fn participant_address(index: NodeIndex) -> SocketAddr {
    let n = index + 1;
    SocketAddr::from(([10, 0, (n >> 8) as u8, n as u8], PARTICIPANT_PORT))
}

fn client_address(index: NodeIndex) -> SocketAddr {
    let n = index + 1;
    SocketAddr::from(([10, 1, (n >> 8) as u8, n as u8], CLIENT_PORT))
}
