//! Unit tests for condition management and generation tracking

use crate::common::{create_test_cluster, empty_status, with_last_switchover};
use postgres_ha_operator::controller::status::{
    condition_status, condition_types, spec_changed, ConditionBuilder,
};

#[test]
fn setting_a_new_condition_records_it() {
    let conditions = ConditionBuilder::new(Some(3))
        .ready(true, "ClusterReady", "Primary is serving")
        .build();

    assert_eq!(conditions.len(), 1);
    let ready = &conditions[0];
    assert_eq!(ready.type_, condition_types::READY);
    assert_eq!(ready.status, condition_status::TRUE);
    assert_eq!(ready.reason, "ClusterReady");
    assert_eq!(ready.observed_generation, Some(3));
    assert!(!ready.last_transition_time.is_empty());
}

#[test]
fn transition_time_moves_only_when_status_flips() {
    let first = ConditionBuilder::new(Some(1))
        .ready(true, "ClusterReady", "Primary is serving")
        .build();
    let original_transition = first[0].last_transition_time.clone();

    // Same status, new reason: updated in place, transition time untouched
    let updated = ConditionBuilder::from_existing(first, Some(2))
        .ready(true, "StillReady", "Roles committed")
        .build();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].last_transition_time, original_transition);
    assert_eq!(updated[0].reason, "StillReady");
    assert_eq!(updated[0].observed_generation, Some(2));

    // Status flip: transition time must move
    let flipped = ConditionBuilder::from_existing(updated, Some(2))
        .ready(false, "SwitchingOver", "Roles being swapped")
        .build();
    assert_eq!(flipped[0].status, condition_status::FALSE);
    assert!(flipped[0].last_transition_time >= original_transition);
}

#[test]
fn distinct_condition_types_coexist() {
    let conditions = ConditionBuilder::new(None)
        .ready(false, "SwitchingOver", "In flight")
        .progressing(true, "Switchover", "In flight")
        .degraded(false, "Healthy", "Cluster is healthy")
        .build();

    assert_eq!(conditions.len(), 3);
    let types: Vec<&str> = conditions.iter().map(|c| c.type_.as_str()).collect();
    assert!(types.contains(&condition_types::READY));
    assert!(types.contains(&condition_types::PROGRESSING));
    assert!(types.contains(&condition_types::DEGRADED));
}

#[test]
fn unobserved_cluster_needs_reconciliation() {
    let cluster = create_test_cluster("pg", "default", 2);
    assert!(spec_changed(&cluster));
}

#[test]
fn observed_generation_match_means_no_spec_change() {
    let mut cluster = create_test_cluster("pg", "default", 2);
    let mut status = empty_status();
    status.observed_generation = Some(1);
    cluster.status = Some(status);

    assert!(!spec_changed(&cluster));

    cluster.metadata.generation = Some(2);
    assert!(spec_changed(&cluster));
}

#[test]
fn recorded_token_survives_in_status() {
    let cluster = with_last_switchover(create_test_cluster("pg", "default", 2), "7");
    assert_eq!(
        cluster.status.and_then(|s| s.last_switchover),
        Some("7".to_string())
    );
}
