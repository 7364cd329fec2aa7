//! End-to-end orchestration tests over the memory backend
//!
//! Covers the delete-after-switchover scenario: a two-pod cluster is
//! switched over via an annotation token, then torn down, and the Killing
//! event for the (new) replica must not be later than the (new) primary's.

use crate::common::{fast_config, memory_cluster};
use postgres_ha_operator::controller::deletion::delete_cluster;
use postgres_ha_operator::controller::events::{reasons, MemoryEventPublisher};
use postgres_ha_operator::controller::roles::PodRole;
use postgres_ha_operator::controller::switchover::{switchover, MostCaughtUp};
use postgres_ha_operator::controller::trigger::{decide, TriggerDecision};

#[tokio::test]
async fn delete_switchover_scenario() {
    // pg-0 carries the legacy master spelling, pg-1 is a replica
    let backend = memory_cluster(&[("pg-0", "master"), ("pg-1", "replica")]);
    backend.mark_ready("pg-1");
    let events = MemoryEventPublisher::new();
    let config = fast_config();

    // Annotate with trigger token T1
    let token = "2026-08-25T09:30:00Z";
    assert!(matches!(decide(None, token), TriggerDecision::Fire(_)));

    let outcome = switchover(
        "delete-switchover",
        "default",
        &backend,
        &MostCaughtUp,
        &events,
        &config,
    )
    .await
    .expect("switchover succeeds");

    // Roles swapped: pg-1 is primary-eligible, pg-0 demoted
    assert_eq!(outcome.new_primary, "pg-1");
    assert_eq!(backend.role_of("pg-1"), Some(PodRole::Primary));
    assert_eq!(backend.role_of("pg-0"), Some(PodRole::Replica));

    // Re-applying the same token must not re-trigger
    assert!(matches!(
        decide(Some(token), token),
        TriggerDecision::Ignore(_)
    ));

    // Now delete the cluster: new replica pg-0 must be killed no later
    // than new primary pg-1
    delete_cluster("delete-switchover", "default", &backend, &events, &config)
        .await
        .expect("teardown succeeds");

    let killing = events.recorded_with_reason(reasons::KILLING);
    assert_eq!(killing.len(), 2);
    assert_eq!(killing[0].pod, "pg-0");
    assert_eq!(killing[1].pod, "pg-1");
    assert!(killing[0].timestamp <= killing[1].timestamp);
}

#[tokio::test]
async fn switchover_then_rollback_keeps_cluster_usable() {
    let backend = memory_cluster(&[("pg-0", "primary"), ("pg-1", "replica"), ("pg-2", "replica")]);
    // Nothing reports ready: promotion will time out
    let events = MemoryEventPublisher::new();
    let config = fast_config();

    switchover("pg", "default", &backend, &MostCaughtUp, &events, &config)
        .await
        .expect_err("promotion times out");

    // Original primary is active and the topology still has one primary
    let primaries: Vec<String> = backend
        .snapshot()
        .into_iter()
        .filter(|p| p.role == Some(PodRole::Primary))
        .map(|p| p.name)
        .collect();
    assert_eq!(primaries, vec!["pg-0".to_string()]);

    // A later teardown still honors the ordering contract
    delete_cluster("pg", "default", &backend, &events, &config)
        .await
        .expect("teardown succeeds");
    let killing = events.recorded_with_reason(reasons::KILLING);
    assert_eq!(killing.last().map(|e| e.pod.clone()), Some("pg-0".to_string()));
}

#[tokio::test]
async fn multi_replica_teardown_kills_every_replica_before_primary() {
    let backend = memory_cluster(&[
        ("pg-0", "primary"),
        ("pg-1", "replica"),
        ("pg-2", "replica"),
        ("pg-3", "replica"),
    ]);
    let events = MemoryEventPublisher::new();

    delete_cluster("pg", "default", &backend, &events, &fast_config())
        .await
        .expect("teardown succeeds");

    let killing = events.recorded_with_reason(reasons::KILLING);
    assert_eq!(killing.len(), 4);
    let primary_ts = killing
        .iter()
        .find(|e| e.pod == "pg-0")
        .expect("primary killed")
        .timestamp;
    for event in killing.iter().filter(|e| e.pod != "pg-0") {
        assert!(
            event.timestamp <= primary_ts,
            "replica {} was killed after the primary",
            event.pod
        );
    }
}
