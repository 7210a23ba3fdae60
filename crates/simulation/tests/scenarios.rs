//! End-to-end protocol scenarios under the deterministic simulation.

use std::time::Duration;
use tracing_test::traced_test;
use twophase_coordinator::CoordinatorConfig;
use twophase_simulation::{DropRule, Endpoint, NetworkConfig, NodeIndex, SimulationRunner};
use twophase_types::Decision;

/// Long enough for the vote window, the ack window and the messages around
/// them with the default latency model.
const ROUND: Duration = Duration::from_secs(4);

fn setup(participants: u32, seed: u64) -> (SimulationRunner, NodeIndex) {
    let mut runner = SimulationRunner::new(NetworkConfig::default(), CoordinatorConfig::default(), seed);
    for _ in 0..participants {
        runner.add_participant();
    }
    let client = runner.add_client();
    runner.run_for(Duration::from_millis(200));
    (runner, client)
}

fn all(participants: u32) -> impl Iterator<Item = NodeIndex> {
    0..participants
}

#[traced_test]
#[test]
fn test_all_accept_commits_on_every_replica() {
    let (mut runner, client) = setup(3, 1);

    let id = runner.submit_put(client, 0, "a", "1");
    runner.run_for(ROUND);

    let decision = runner.decision_for(id).expect("decision taken");
    assert_eq!(decision.decision, Decision::Commit);
    assert_eq!(decision.recipients.len(), 3);
    for p in all(3) {
        assert_eq!(runner.delivered_to(Endpoint::Participant(p), "Commit").len(), 1);
        assert_eq!(runner.get(p, "a").as_deref(), Some("1"));
    }

    let results = runner.client_results(client);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].result, "key: a value: 1 has been stored");
    assert_eq!(results[0].participant_id, runner.participant_id(0));
    assert!(runner.coordinator().crashed().is_empty());
}

#[traced_test]
#[test]
fn test_single_reject_aborts_every_replica() {
    let (mut runner, client) = setup(3, 2);

    // Only participant 2 already holds the key, so only it rejects.
    runner
        .participant(2)
        .expect("participant running")
        .store()
        .put("a", "0");

    let id = runner.submit_put(client, 0, "a", "1");
    runner.run_for(ROUND);

    assert_eq!(runner.decision_for(id).map(|d| d.decision), Some(Decision::Abort));
    for p in all(3) {
        assert_eq!(runner.delivered_to(Endpoint::Participant(p), "Abort").len(), 1);
        assert!(runner.delivered_to(Endpoint::Participant(p), "Commit").is_empty());
    }
    assert_eq!(runner.get(0, "a"), None);
    assert_eq!(runner.get(1, "a"), None);
    assert_eq!(runner.get(2, "a").as_deref(), Some("0"));

    let results = runner.client_results(client);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].result, "key: a was rejected by another replica");
}

#[traced_test]
#[test]
fn test_legality_rule_end_to_end() {
    let (mut runner, client) = setup(3, 3);

    let missing = runner.submit_delete(client, 1, "a");
    runner.run_for(ROUND);
    assert_eq!(runner.decision_for(missing).map(|d| d.decision), Some(Decision::Abort));

    let first = runner.submit_put(client, 1, "a", "1");
    runner.run_for(ROUND);
    assert_eq!(runner.decision_for(first).map(|d| d.decision), Some(Decision::Commit));

    let overwrite = runner.submit_put(client, 2, "a", "2");
    runner.run_for(ROUND);
    assert_eq!(runner.decision_for(overwrite).map(|d| d.decision), Some(Decision::Abort));

    let delete = runner.submit_delete(client, 0, "a");
    runner.run_for(ROUND);
    assert_eq!(runner.decision_for(delete).map(|d| d.decision), Some(Decision::Commit));

    let texts: Vec<_> = runner
        .client_results(client)
        .iter()
        .map(|r| r.result.as_str())
        .collect();
    assert_eq!(
        texts,
        vec![
            "key: a is not found",
            "key: a value: 1 has been stored",
            "key: a value: 1 is immutable",
            "key: a has been deleted",
        ]
    );
    for p in all(3) {
        assert_eq!(runner.get(p, "a"), None);
    }
}

#[traced_test]
#[test]
fn test_zero_participants_commit_vacuously() {
    let mut runner = SimulationRunner::new(NetworkConfig::default(), CoordinatorConfig::default(), 4);
    let p = runner.add_participant();
    let client = runner.add_client();
    // The participant never makes it into the membership.
    runner
        .network_mut()
        .add_drop_rule(DropRule::sent_by(Endpoint::Participant(p)).of_kind("Register"));
    runner.run_for(Duration::from_millis(200));
    assert_eq!(runner.coordinator().member_count(), 0);

    let id = runner.submit_put(client, p, "a", "1");
    runner.run_for(ROUND);

    let decision = runner.decision_for(id).expect("decision taken");
    assert_eq!(decision.decision, Decision::Commit);
    assert!(decision.recipients.is_empty());
    assert!(runner.coordinator().is_decided(&id));
}

#[traced_test]
#[test]
fn test_vote_silent_participant_excluded_not_crashed() {
    let (mut runner, client) = setup(3, 5);
    runner
        .network_mut()
        .add_drop_rule(DropRule::sent_by(Endpoint::Participant(2)).of_kind("Accept"));

    let id = runner.submit_put(client, 0, "a", "1");
    // Past the vote window, before the ack window closes.
    runner.run_for(Duration::from_millis(1500));

    let decision = runner.decision_for(id).expect("decision taken");
    assert_eq!(decision.decision, Decision::Commit);
    let mut recipients = decision.recipients.clone();
    recipients.sort();
    let mut expected = vec![runner.participant_id(0), runner.participant_id(1)];
    expected.sort();
    assert_eq!(recipients, expected);
    assert!(runner.delivered_to(Endpoint::Participant(2), "Commit").is_empty());
    assert!(!runner.coordinator().is_crashed(&runner.participant_id(2)));
    assert_eq!(runner.get(0, "a").as_deref(), Some("1"));
    assert_eq!(runner.get(2, "a"), None);
}

#[traced_test]
#[test]
fn test_ack_silent_participant_crashed_then_resynced() {
    let (mut runner, client) = setup(3, 6);
    runner
        .network_mut()
        .add_drop_rule(DropRule::sent_by(Endpoint::Participant(2)).of_kind("AckCommit"));

    runner.submit_put(client, 0, "a", "1");
    runner.run_for(ROUND);

    let lost = runner.participant_id(2);
    assert!(runner.coordinator().is_crashed(&lost));
    assert!(runner.coordinator().is_member(&lost));
    assert_eq!(
        runner.coordinator().backup_snapshot().get("a").map(String::as_str),
        Some("1")
    );

    // Comes back empty on the same address and re-registers.
    runner.network_mut().clear_drop_rules();
    runner.crash_participant(2);
    runner.restart_participant(2);
    runner.run_for(Duration::from_secs(1));
    assert!(runner.coordinator().is_recovery_pending(&lost));
    assert_eq!(runner.get(2, "a"), None);

    runner.run_for(Duration::from_secs(5));
    assert_eq!(runner.delivered_to(Endpoint::Participant(2), "Sync").len(), 1);
    assert_eq!(runner.get(2, "a").as_deref(), Some("1"));
    assert!(!runner.coordinator().is_crashed(&lost));
}

#[traced_test]
#[test]
fn test_repeated_sync_is_idempotent() {
    let (mut runner, client) = setup(2, 7);
    let snapshot = |runner: &SimulationRunner, p| {
        runner.participant(p).expect("running").store().snapshot()
    };

    for (round, key) in ["a", "b"].into_iter().enumerate() {
        // Participant 1 applies the commit but its ack is lost.
        runner
            .network_mut()
            .add_drop_rule(DropRule::sent_by(Endpoint::Participant(1)).of_kind("AckCommit"));
        runner.submit_put(client, 0, key, "1");
        runner.run_for(ROUND);
        runner.network_mut().clear_drop_rules();
        assert!(runner.coordinator().is_crashed(&runner.participant_id(1)));

        // It re-registers with its replica intact; the sync re-applies what it has.
        let before = snapshot(&runner, 1);
        runner.reregister_participant(1);
        runner.run_for(Duration::from_secs(6));

        assert_eq!(runner.delivered_to(Endpoint::Participant(1), "Sync").len(), round + 1);
        assert_eq!(snapshot(&runner, 1), before);
        assert_eq!(snapshot(&runner, 1), snapshot(&runner, 0));
        assert!(!runner.coordinator().is_crashed(&runner.participant_id(1)));
    }
}

#[traced_test]
#[test]
fn test_concurrent_put_and_delete_on_one_key() {
    let (mut runner, client) = setup(3, 8);
    let other = runner.add_client();

    let put = runner.submit_put(client, 0, "a", "1");
    let delete = runner.submit_delete(other, 1, "a");
    runner.run_for(ROUND);

    // Both were prepared against an absent key.
    assert_eq!(runner.decision_for(put).map(|d| d.decision), Some(Decision::Commit));
    assert_eq!(runner.decision_for(delete).map(|d| d.decision), Some(Decision::Abort));
    for p in all(3) {
        assert_eq!(runner.get(p, "a").as_deref(), Some("1"));
    }
    assert_eq!(runner.client_results(client).len(), 1);
    assert_eq!(runner.client_results(other).len(), 1);
}

#[traced_test]
#[test]
fn test_concurrent_transactions_use_independent_windows() {
    let (mut runner, client) = setup(3, 9);

    let ids: Vec<_> = (0..5)
        .map(|i| runner.submit_put(client, i % 3, &format!("k{i}"), &i.to_string()))
        .collect();
    runner.run_for(ROUND);

    for id in &ids {
        let decision = runner.decision_for(*id).expect("decision taken");
        assert_eq!(decision.decision, Decision::Commit);
        assert_eq!(decision.recipients.len(), 3);
    }
    for p in all(3) {
        assert_eq!(runner.participant(p).expect("running").store().len(), 5);
    }
    assert_eq!(runner.client_results(client).len(), 5);
    assert_eq!(runner.coordinator().in_flight(), 0);
}

#[traced_test]
#[test]
fn test_unreachable_participant_still_prepared_after_recovery() {
    let (mut runner, client) = setup(3, 10);
    runner.network_mut().isolate(Endpoint::Participant(2));

    let id = runner.submit_put(client, 0, "a", "1");
    runner.run_for(ROUND);
    assert_eq!(runner.decision_for(id).map(|d| d.decision), Some(Decision::Commit));
    // Missed the commit entirely, so it is treated as lost once the ack window closes.
    assert!(runner.coordinator().is_crashed(&runner.participant_id(2)));

    runner.network_mut().heal(Endpoint::Participant(2));
    let next = runner.submit_put(client, 1, "b", "2");
    runner.run_for(ROUND);
    assert_eq!(runner.decision_for(next).map(|d| d.decision), Some(Decision::Commit));
    assert_eq!(runner.delivered_to(Endpoint::Participant(2), "Prepare").len(), 1);
    assert_eq!(runner.get(2, "b").as_deref(), Some("2"));
}

#[traced_test]
#[test]
fn test_round_without_votes_is_dropped_everywhere() {
    let (mut runner, client) = setup(2, 11);
    runner
        .network_mut()
        .add_drop_rule(DropRule::sent_to(Endpoint::Coordinator).of_kind("Accept"));

    let id = runner.submit_put(client, 0, "a", "1");
    runner.run_for(Duration::from_secs(1));
    assert_eq!(runner.coordinator().in_flight(), 1);
    assert_eq!(runner.participant(0).expect("running").pending_count(), 1);

    // Past the round deadline: the coordinator forgets the transaction.
    runner.run_for(ROUND);
    assert_eq!(runner.coordinator().in_flight(), 0);
    assert!(runner.coordinator().is_decided(&id));
    assert!(runner.decision_for(id).is_none());
    assert!(runner.coordinator().crashed().is_empty());

    // Past the pending-client timeout: the participant forgets the client.
    runner.run_for(Duration::from_secs(10));
    assert_eq!(runner.participant(0).expect("running").pending_count(), 0);
    assert!(runner.client_results(client).is_empty());
    for p in all(2) {
        assert_eq!(runner.get(p, "a"), None);
    }
}
