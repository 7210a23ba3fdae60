//! Participant state machine.

use crate::outcome::{is_legal, result_text};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use twophase_core::{Action, Event, StateMachine, TimerId};
use twophase_messages::{ClientCallback, CoordinatorRequest};
use twophase_types::{
    ClientEndpoint, Dataset, Decision, KvStore, MessageId, Operation, ParticipantId,
    TransactionMessage, Vote,
};

/// How long a client write may wait for a decision before it is forgotten.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(10);

/// A client waiting on a transaction it sent to this replica.
#[derive(Debug, Clone, Copy)]
struct PendingClient {
    client: ClientEndpoint,
    received_at: Duration,
}

/// One replica of the store.
pub struct ParticipantState {
    /// Stable identity, derived from `address`.
    id: ParticipantId,

    /// Where this participant's service listens.
    address: SocketAddr,

    /// The replica. Shared with the runner so reads bypass the event queue.
    store: Arc<KvStore>,

    /// Clients waiting for a result, by transaction.
    ///
    /// Only the replica that received the write holds an entry, so each
    /// client is notified exactly once.
    pending_clients: HashMap<MessageId, PendingClient>,

    /// How long an entry in `pending_clients` may wait for its decision.
    pending_timeout: Duration,

    /// Current time.
    now: Duration,
}

impl ParticipantState {
    /// Create a participant with an empty replica.
    pub fn new(address: SocketAddr) -> Self {
        Self::with_store(address, Arc::new(KvStore::new()))
    }

    /// Create a participant on top of an existing store handle.
    pub fn with_store(address: SocketAddr, store: Arc<KvStore>) -> Self {
        Self {
            id: ParticipantId::derive(address),
            address,
            store,
            pending_clients: HashMap::new(),
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
            now: Duration::ZERO,
        }
    }

    /// Set how long a client write may wait for its decision.
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }

    /// Get this participant's id.
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Get the service address.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Get a handle to the replica.
    pub fn store(&self) -> Arc<KvStore> {
        Arc::clone(&self.store)
    }

    /// Read a key from the local replica.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    /// Check if a client is waiting on `id` at this replica.
    pub fn is_pending(&self, id: &MessageId) -> bool {
        self.pending_clients.contains_key(id)
    }

    /// Number of clients waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.pending_clients.len()
    }

    fn on_started(&mut self) -> Vec<Action> {
        info!(participant = self.id.short(), address = %self.address, "Registering with coordinator");
        vec![Action::SendToCoordinator(CoordinatorRequest::Register {
            participant_id: self.id.clone(),
            address: self.address,
        })]
    }

    /// Remember the client and hand the write to the coordinator. The client
    /// hears back only once the transaction is decided.
    fn on_client_write(&mut self, message: TransactionMessage, client: ClientEndpoint) -> Vec<Action> {
        let id = message.id();
        let pending = PendingClient {
            client,
            received_at: self.now,
        };
        if let Some(previous) = self.pending_clients.insert(id, pending) {
            debug!(tx = %id, previous = %previous.client, "Client write resubmitted");
        }
        info!(
            tx = %id,
            op = message.operation().label(),
            key = message.key(),
            %client,
            "Client write received"
        );
        vec![
            Action::SendToCoordinator(CoordinatorRequest::RequirePrepare {
                participant_id: self.id.clone(),
                message,
            }),
            Action::SetTimer {
                id: TimerId::PendingClient(id),
                duration: self.pending_timeout,
            },
        ]
    }

    /// Forget a client whose transaction was never decided here. A newer
    /// resubmission of the same write keeps its entry until its own timer.
    fn on_pending_timer(&mut self, id: MessageId) -> Vec<Action> {
        let Some(pending) = self.pending_clients.get(&id) else {
            return vec![];
        };
        let age = self.now.saturating_sub(pending.received_at);
        if age < self.pending_timeout {
            debug!(tx = %id, ?age, "Pending client refreshed, keeping");
            return vec![];
        }
        warn!(tx = %id, client = %pending.client, ?age, "No decision for client write, forgetting client");
        self.pending_clients.remove(&id);
        vec![]
    }

    fn on_prepare(&mut self, message: TransactionMessage) -> Vec<Action> {
        let vote = Vote::from_legal(is_legal(&self.store, &message));
        info!(
            tx = %message.id(),
            op = message.operation().label(),
            key = message.key(),
            %vote,
            "Voting"
        );
        vec![Action::SendToCoordinator(CoordinatorRequest::vote(
            self.id.clone(),
            message,
            vote,
        ))]
    }

    /// Apply (commit only), acknowledge, then notify the waiting client.
    fn on_decision(&mut self, message: TransactionMessage, decision: Decision) -> Vec<Action> {
        let id = message.id();
        match decision {
            Decision::Commit => self.apply(&message),
            Decision::Abort => info!(tx = %id, key = message.key(), "Transaction aborted"),
        }

        // Abort texts read the untouched replica; commit texts do not read it.
        let result = result_text(&self.store, &message, decision);
        let client = self.pending_clients.remove(&id).map(|pending| pending.client);

        let mut actions = vec![Action::SendToCoordinator(CoordinatorRequest::ack(
            self.id.clone(),
            message.clone(),
            decision,
        ))];
        if let Some(client) = client {
            debug!(tx = %id, %client, %result, "Notifying client");
            actions.push(Action::DeliverResult {
                client,
                callback: ClientCallback::DeliverResult {
                    participant_id: self.id.clone(),
                    result,
                    message,
                },
            });
        }
        actions
    }

    /// Commit is unconditional: the coordinator already checked every vote.
    fn apply(&self, message: &TransactionMessage) {
        match message.operation() {
            Operation::Put { value } => {
                if let Some(previous) = self.store.put(message.key(), value.as_str()) {
                    warn!(tx = %message.id(), key = message.key(), %previous, "Commit overwrote existing value");
                }
                info!(tx = %message.id(), key = message.key(), %value, "Committed PUT");
            }
            Operation::Delete => {
                if self.store.delete(message.key()).is_none() {
                    warn!(tx = %message.id(), key = message.key(), "Commit deleted missing key");
                }
                info!(tx = %message.id(), key = message.key(), "Committed DELETE");
            }
        }
    }

    fn on_sync(&mut self, dataset: Dataset) -> Vec<Action> {
        info!(participant = self.id.short(), keys = dataset.len(), "Synchronizing from backup log");
        self.store.bulk_load(dataset);
        vec![]
    }
}

impl StateMachine for ParticipantState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::Started => self.on_started(),
            Event::ClientWrite { message, client } => self.on_client_write(message, client),
            Event::PrepareRequested { message } => self.on_prepare(message),
            Event::DecisionReceived { message, decision } => self.on_decision(message, decision),
            Event::SyncRequested { dataset } => self.on_sync(dataset),
            Event::TimerFired(TimerId::PendingClient(id)) => self.on_pending_timer(id),
            other => {
                debug!(event = other.type_name(), "Ignoring coordinator event");
                vec![]
            }
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
