//! Coordinator state machine.

use crate::backup::BackupLog;
use crate::config::CoordinatorConfig;
use crate::context::{TransactionContext, TransactionPhase};
use crate::history::DecidedHistory;
use crate::recovery::RecoveryQueue;
use crate::trackers::{AckTracker, VoteTracker};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, warn};
use twophase_core::{Action, Event, StateMachine, TimerId};
use twophase_messages::ParticipantRequest;
use twophase_types::{Dataset, Decision, MessageId, ParticipantId, TransactionMessage, Vote};

/// The single authoritative 2PC coordinator.
///
/// Membership is never shrunk: a participant that stops answering is only
/// marked crashed, and keeps receiving `Prepare` so that it can take part
/// again as soon as it is back.
pub struct CoordinatorState {
    /// Window lengths and capacities.
    config: CoordinatorConfig,

    /// participant -> service address, in registration order.
    members: IndexMap<ParticipantId, SocketAddr>,

    /// Participants believed unreachable.
    crashed: BTreeSet<ParticipantId>,

    /// Open transactions, oldest first.
    contexts: IndexMap<MessageId, TransactionContext>,

    /// Recently closed transactions.
    history: DecidedHistory,

    /// Shadow copy of committed data for resynchronization.
    backup: BackupLog,

    /// Rejoined participants waiting for their settle delay.
    recovery: RecoveryQueue,

    /// Current time.
    now: Duration,
}

impl CoordinatorState {
    /// Create a coordinator with no members.
    pub fn new(config: CoordinatorConfig) -> Self {
        let history = DecidedHistory::new(config.decided_history);
        Self {
            config,
            members: IndexMap::new(),
            crashed: BTreeSet::new(),
            contexts: IndexMap::new(),
            history,
            backup: BackupLog::new(),
            recovery: RecoveryQueue::new(),
            now: Duration::ZERO,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get the configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Check if `participant` is registered.
    pub fn is_member(&self, participant: &ParticipantId) -> bool {
        self.members.contains_key(participant)
    }

    /// Registered participants and their addresses, in registration order.
    pub fn members(&self) -> impl Iterator<Item = (&ParticipantId, &SocketAddr)> {
        self.members.iter()
    }

    /// Number of registered participants.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if `participant` is marked crashed.
    pub fn is_crashed(&self, participant: &ParticipantId) -> bool {
        self.crashed.contains(participant)
    }

    /// Participants marked crashed.
    pub fn crashed(&self) -> &BTreeSet<ParticipantId> {
        &self.crashed
    }

    /// Copy of the backup log.
    pub fn backup_snapshot(&self) -> Dataset {
        self.backup.snapshot()
    }

    /// Get the context of an open transaction.
    pub fn context(&self, id: &MessageId) -> Option<&TransactionContext> {
        self.contexts.get(id)
    }

    /// Number of open transactions.
    pub fn in_flight(&self) -> usize {
        self.contexts.len()
    }

    /// Check if `id` was closed recently.
    pub fn is_decided(&self, id: &MessageId) -> bool {
        self.history.contains(id)
    }

    /// Check if a recovery is pending for `participant`.
    pub fn is_recovery_pending(&self, participant: &ParticipantId) -> bool {
        self.recovery.is_pending(participant)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Phase 1: prepare and vote
    // ═══════════════════════════════════════════════════════════════════════════

    /// Broadcast `Prepare` to every registered participant, crashed or not.
    fn on_require_prepare(&mut self, from: ParticipantId, message: TransactionMessage) -> Vec<Action> {
        let id = message.id();
        if self.history.contains(&id) || self.contexts.contains_key(&id) {
            warn!(tx = %id, from = from.short(), "Duplicate prepare request ignored");
            return vec![];
        }
        if !self.members.contains_key(&from) {
            warn!(tx = %id, from = from.short(), "Prepare requested by unregistered participant");
        }

        info!(
            tx = %id,
            from = from.short(),
            op = message.operation().label(),
            key = message.key(),
            participants = self.members.len(),
            "Starting transaction"
        );

        let targets: Vec<ParticipantId> = self.members.keys().cloned().collect();
        if targets.is_empty() {
            // Nobody to ask: every vote is trivially collected.
            info!(tx = %id, "No participants registered, committing vacuously");
            self.backup.record(&message, Decision::Commit);
            self.history.insert(id);
            return vec![Action::EmitDecision {
                message,
                decision: Decision::Commit,
                recipients: vec![],
            }];
        }

        let mut actions = self.broadcast(&targets, |message| ParticipantRequest::Prepare { message }, &message);
        actions.push(Action::SetTimer {
            id: TimerId::VoteDeadline(id),
            duration: self.config.round_deadline,
        });
        let context = TransactionContext::new(message, Some(from), targets, self.now);
        self.open_context(context);
        actions
    }

    /// Record a vote. The first vote of a transaction arms its window.
    fn on_vote(&mut self, from: ParticipantId, message: TransactionMessage, vote: Vote) -> Vec<Action> {
        let id = message.id();
        if self.history.contains(&id) {
            debug!(tx = %id, from = from.short(), %vote, "Vote for closed transaction ignored");
            return vec![];
        }
        if !self.members.contains_key(&from) {
            warn!(tx = %id, from = from.short(), "Vote from unknown participant ignored");
            return vec![];
        }

        if !self.contexts.contains_key(&id) {
            // Never saw the prepare request; fall back to current membership.
            let targets = self.members.keys().cloned().collect();
            self.open_context(TransactionContext::new(message, None, targets, self.now));
        }
        let now = self.now;
        let Some(context) = self.contexts.get_mut(&id) else {
            return vec![];
        };

        if !context.accepts_votes() {
            debug!(tx = %id, from = from.short(), %vote, "Vote after decision ignored");
            return vec![];
        }
        if !context.is_target(&from) {
            debug!(tx = %id, from = from.short(), "Vote from participant outside the round ignored");
            return vec![];
        }

        let mut actions = vec![];
        let tracker = context.votes.get_or_insert_with(|| {
            actions.push(Action::SetTimer {
                id: TimerId::VoteWindow(id),
                duration: self.config.vote_timeout,
            });
            VoteTracker::new(now)
        });

        if tracker.add_vote(from.clone(), vote) {
            info!(tx = %id, from = from.short(), %vote, votes = tracker.len(), "Vote recorded");
        } else {
            debug!(tx = %id, from = from.short(), "Duplicate vote ignored");
        }
        actions
    }

    /// Close the vote window and send the decision to every participant
    /// that voted.
    fn on_vote_window(&mut self, id: MessageId) -> Vec<Action> {
        let Some(context) = self.contexts.get_mut(&id) else {
            debug!(tx = %id, "Vote window fired for unknown transaction");
            return vec![];
        };
        let Some(votes) = context.votes.take() else {
            return vec![];
        };

        let decision = votes.decision();
        let recipients: Vec<ParticipantId> = context
            .targets()
            .iter()
            .filter(|target| votes.has_voted(target))
            .cloned()
            .collect();

        let window = self.now.saturating_sub(votes.opened_at());
        if votes.all_voted(context.targets()) {
            info!(
                tx = %id,
                %decision,
                votes = votes.len(),
                rejects = votes.reject_count(),
                ?window,
                "All participants voted"
            );
        } else {
            let silent: Vec<&str> = context
                .targets()
                .iter()
                .filter(|target| !votes.has_voted(target))
                .map(ParticipantId::short)
                .collect();
            warn!(
                tx = %id,
                %decision,
                votes = votes.len(),
                ?silent,
                requested_by = context.requested_by().map(ParticipantId::short),
                "Vote window closed without every vote, deciding for the responsive subset"
            );
        }

        context.outcome = Some((decision, recipients.clone()));
        let message = context.message().clone();

        let mut actions = match decision {
            Decision::Commit => {
                self.broadcast(&recipients, |message| ParticipantRequest::Commit { message }, &message)
            }
            Decision::Abort => {
                self.broadcast(&recipients, |message| ParticipantRequest::Abort { message }, &message)
            }
        };
        if recipients.is_empty() {
            self.close_context(&id);
        } else {
            actions.push(Action::SetTimer {
                id: TimerId::AckDeadline(id),
                duration: self.config.round_deadline,
            });
        }
        actions.push(Action::EmitDecision {
            message,
            decision,
            recipients,
        });
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Phase 2: acknowledgements
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record an ack. The first ack arms the ack window and writes the
    /// outcome to the backup log.
    fn on_ack(&mut self, from: ParticipantId, message: TransactionMessage, decision: Decision) -> Vec<Action> {
        let id = message.id();
        if self.history.contains(&id) {
            debug!(tx = %id, from = from.short(), "Ack for closed transaction ignored");
            return vec![];
        }
        let now = self.now;
        let Some(context) = self.contexts.get_mut(&id) else {
            warn!(tx = %id, from = from.short(), "Ack for unknown transaction ignored");
            return vec![];
        };
        if context.decision() != Some(decision) {
            warn!(
                tx = %id,
                from = from.short(),
                acked = %decision,
                "Ack does not match the decision, ignored"
            );
            return vec![];
        }

        let mut actions = vec![];
        if context.acks.is_none() {
            if self.backup.record(context.message(), decision) {
                info!(tx = %id, key = context.message().key(), "Backup log updated");
            }
            actions.push(Action::SetTimer {
                id: TimerId::AckWindow(id),
                duration: self.config.ack_timeout,
            });
        }
        let tracker = context
            .acks
            .get_or_insert_with(|| AckTracker::new(decision, now));

        if tracker.add_ack(from.clone()) {
            info!(tx = %id, from = from.short(), %decision, acks = tracker.len(), "Ack recorded");
        } else {
            debug!(tx = %id, from = from.short(), "Duplicate ack ignored");
        }
        actions
    }

    /// Close the ack window. Every prepared participant that did not ack is
    /// marked crashed.
    fn on_ack_window(&mut self, id: MessageId) -> Vec<Action> {
        let Some(context) = self.contexts.get(&id) else {
            debug!(tx = %id, "Ack window fired for unknown transaction");
            return vec![];
        };
        let Some(acks) = context.acks() else {
            return vec![];
        };

        let missing = acks.missing(context.targets());
        if missing.is_empty() {
            info!(
                tx = %id,
                decision = %acks.decision(),
                window = ?self.now.saturating_sub(acks.opened_at()),
                "Received acks from all participants"
            );
        }
        for participant in missing {
            warn!(
                tx = %id,
                participant = participant.short(),
                "No ack within window, marking participant crashed"
            );
            self.crashed.insert(participant);
        }

        self.close_context(&id);
        vec![]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Deadlines
    // ═══════════════════════════════════════════════════════════════════════════

    /// Drop a transaction nobody voted on. No decision is taken, so nobody
    /// is told anything and nobody is marked crashed.
    fn on_vote_deadline(&mut self, id: MessageId) -> Vec<Action> {
        let Some(context) = self.contexts.get(&id) else {
            return vec![];
        };
        if context.phase() != TransactionPhase::Preparing {
            return vec![];
        }
        warn!(
            tx = %id,
            key = context.message().key(),
            requested_by = context.requested_by().map(ParticipantId::short),
            age = ?self.now.saturating_sub(context.created_at()),
            "No vote before the deadline, dropping transaction"
        );
        self.close_context(&id);
        vec![]
    }

    /// Close a decided transaction that never saw an ack. Every target is
    /// ack-silent, so every target is marked crashed.
    fn on_ack_deadline(&mut self, id: MessageId) -> Vec<Action> {
        let Some(context) = self.contexts.get(&id) else {
            return vec![];
        };
        if context.phase() != TransactionPhase::AwaitingAcks {
            return vec![];
        }
        let targets = context.targets().to_vec();
        warn!(
            tx = %id,
            decision = ?context.decision(),
            participants = targets.len(),
            age = ?self.now.saturating_sub(context.created_at()),
            "No ack before the deadline, marking participants crashed"
        );
        self.crashed.extend(targets);
        self.close_context(&id);
        vec![]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Membership and recovery
    // ═══════════════════════════════════════════════════════════════════════════

    /// Ask the runner to resolve the participant's handle.
    fn on_register_requested(&mut self, participant_id: ParticipantId, address: SocketAddr) -> Vec<Action> {
        info!(participant = participant_id.short(), %address, "Registration requested");
        vec![Action::ResolveParticipant {
            participant_id,
            address,
        }]
    }

    /// Store the handle. A crashed participant coming back gets a recovery.
    fn on_participant_resolved(&mut self, participant_id: ParticipantId, address: SocketAddr) -> Vec<Action> {
        if let Some(previous) = self.members.insert(participant_id.clone(), address) {
            if previous != address {
                info!(participant = participant_id.short(), %previous, %address, "Participant moved");
            }
        }
        info!(
            participant = participant_id.short(),
            %address,
            participants = self.members.len(),
            "Participant registered"
        );

        if !self.crashed.contains(&participant_id) {
            return vec![];
        }
        if !self.recovery.schedule(participant_id.clone(), self.now) {
            debug!(participant = participant_id.short(), "Recovery already pending");
            return vec![];
        }
        info!(participant = participant_id.short(), "Crashed participant reconnected, scheduling sync");
        vec![Action::SetTimer {
            id: TimerId::Recovery(participant_id),
            duration: self.config.recovery_settle_delay,
        }]
    }

    /// Push the whole backup log and clear the crashed mark.
    fn on_recovery_timer(&mut self, participant_id: ParticipantId) -> Vec<Action> {
        if self.recovery.take(&participant_id).is_none() {
            return vec![];
        }
        let Some(&address) = self.members.get(&participant_id) else {
            return vec![];
        };
        if !self.crashed.remove(&participant_id) {
            debug!(participant = participant_id.short(), "Participant no longer crashed, skipping sync");
            return vec![];
        }

        let dataset = self.backup.snapshot();
        info!(participant = participant_id.short(), keys = dataset.len(), "Synchronizing participant");
        vec![Action::SendToParticipant {
            participant_id,
            address,
            request: ParticipantRequest::Sync { dataset },
        }]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════════

    /// Build one send per participant, using its current address.
    fn broadcast(
        &self,
        participants: &[ParticipantId],
        request: impl Fn(TransactionMessage) -> ParticipantRequest,
        message: &TransactionMessage,
    ) -> Vec<Action> {
        participants
            .iter()
            .filter_map(|participant_id| {
                let address = *self.members.get(participant_id)?;
                Some(Action::SendToParticipant {
                    participant_id: participant_id.clone(),
                    address,
                    request: request(message.clone()),
                })
            })
            .collect()
    }

    /// Track a new context, making room if the limit is reached.
    ///
    /// The oldest context still waiting for its first ack goes first; if
    /// there is none, the oldest context of any phase goes.
    fn open_context(&mut self, context: TransactionContext) {
        while self.contexts.len() >= self.config.max_in_flight {
            let stale = self
                .contexts
                .iter()
                .find(|(_, ctx)| ctx.phase() == TransactionPhase::AwaitingAcks)
                .or_else(|| self.contexts.first())
                .map(|(id, ctx)| (*id, ctx.phase()));
            let Some((stale, phase)) = stale else {
                break;
            };
            warn!(tx = %stale, ?phase, limit = self.config.max_in_flight, "Too many open transactions, dropping oldest");
            self.close_context(&stale);
        }
        self.contexts.insert(context.message().id(), context);
    }

    /// Forget a context and remember its id as closed.
    fn close_context(&mut self, id: &MessageId) {
        self.contexts.shift_remove(id);
        self.history.insert(*id);
    }
}

impl StateMachine for CoordinatorState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::RequirePrepare { from, message } => self.on_require_prepare(from, message),
            Event::VoteReceived {
                from,
                message,
                vote,
            } => self.on_vote(from, message, vote),
            Event::AckReceived {
                from,
                message,
                decision,
            } => self.on_ack(from, message, decision),
            Event::RegisterRequested {
                participant_id,
                address,
            } => self.on_register_requested(participant_id, address),
            Event::ParticipantResolved {
                participant_id,
                address,
            } => self.on_participant_resolved(participant_id, address),
            Event::TimerFired(TimerId::VoteWindow(id)) => self.on_vote_window(id),
            Event::TimerFired(TimerId::AckWindow(id)) => self.on_ack_window(id),
            Event::TimerFired(TimerId::VoteDeadline(id)) => self.on_vote_deadline(id),
            Event::TimerFired(TimerId::AckDeadline(id)) => self.on_ack_deadline(id),
            Event::TimerFired(TimerId::Recovery(participant)) => self.on_recovery_timer(participant),
            Event::Started => {
                info!("Coordinator started");
                vec![]
            }
            other => {
                debug!(event = other.type_name(), "Ignoring participant event");
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
