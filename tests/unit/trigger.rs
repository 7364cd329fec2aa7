//! Unit tests for switchover trigger evaluation

use postgres_ha_operator::controller::trigger::{
    decide, IgnoreReason, TriggerDecision, TriggerToken,
};

#[test]
fn firing_twice_with_same_timestamp_yields_one_run() {
    let token = "2026-08-25T09:30:00Z";

    // First observation fires and gets recorded
    let first = decide(None, token);
    assert!(matches!(first, TriggerDecision::Fire(_)));

    // A duplicate reconciliation pass sees the recorded token and ignores it
    let second = decide(Some(token), token);
    assert_eq!(
        second,
        TriggerDecision::Ignore(IgnoreReason::AlreadyProcessed)
    );
}

#[test]
fn stale_annotation_never_refires_after_newer_one() {
    let newer = "2026-08-25T10:00:00Z";
    let older = "2026-08-25T09:00:00Z";

    assert_eq!(
        decide(Some(newer), older),
        TriggerDecision::Ignore(IgnoreReason::NotNewer)
    );
}

#[test]
fn sequence_tokens_fire_in_strict_order_only() {
    assert!(matches!(decide(Some("1"), "2"), TriggerDecision::Fire(_)));
    assert_eq!(
        decide(Some("2"), "2"),
        TriggerDecision::Ignore(IgnoreReason::AlreadyProcessed)
    );
    assert_eq!(
        decide(Some("2"), "1"),
        TriggerDecision::Ignore(IgnoreReason::NotNewer)
    );
}

#[test]
fn malformed_annotation_is_recovered_locally() {
    // Not an error the caller has to handle; just an ignore with the value
    match decide(Some("5"), "soon") {
        TriggerDecision::Ignore(IgnoreReason::Malformed(value)) => assert_eq!(value, "soon"),
        other => panic!("expected Malformed ignore, got {:?}", other),
    }
}

#[test]
fn token_parse_roundtrips_both_forms() {
    assert!(matches!(
        TriggerToken::parse("2026-08-25T09:30:00+00:00"),
        Some(TriggerToken::Timestamp(_))
    ));
    assert_eq!(TriggerToken::parse("17"), Some(TriggerToken::Sequence(17)));
    assert_eq!(TriggerToken::parse("  "), None);
}
