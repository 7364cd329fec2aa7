// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for the pure orchestration logic
//!
//! These cover the invariants that hold for every input shape rather than a
//! handful of fixtures: deletion ordering, the primary termination gate,
//! trigger monotonicity, and replica selection.

use proptest::prelude::*;

use postgres_ha_operator::controller::backend::{PodInfo, PodLifecycle};
use postgres_ha_operator::controller::deletion::{deletion_order, primary_may_terminate};
use postgres_ha_operator::controller::roles::PodRole;
use postgres_ha_operator::controller::switchover::{MostCaughtUp, ReplicaSelector};
use postgres_ha_operator::controller::trigger::{decide, IgnoreReason, TriggerDecision};

fn arb_role() -> impl Strategy<Value = Option<PodRole>> {
    prop_oneof![
        Just(Some(PodRole::Primary)),
        Just(Some(PodRole::Replica)),
        Just(Some(PodRole::Demoting)),
        Just(Some(PodRole::Promoting)),
        Just(None),
    ]
}

fn arb_lifecycle() -> impl Strategy<Value = PodLifecycle> {
    prop_oneof![
        Just(PodLifecycle::Running),
        Just(PodLifecycle::Terminating),
        Just(PodLifecycle::Deleted),
    ]
}

fn arb_pod(index: usize) -> impl Strategy<Value = PodInfo> {
    (arb_role(), arb_lifecycle(), proptest::option::of(0u64..1 << 30)).prop_map(
        move |(role, lifecycle, lag_bytes)| {
            let mut pod = PodInfo::new(&format!("pg-{index}"), role);
            pod.lifecycle = lifecycle;
            pod.lag_bytes = lag_bytes;
            pod
        },
    )
}

fn arb_pod_set() -> impl Strategy<Value = Vec<PodInfo>> {
    (0usize..8).prop_flat_map(|n| {
        let pods: Vec<_> = (0..n).map(arb_pod).collect();
        pods
    })
}

proptest! {
    /// The issuance order is a permutation of the input with every
    /// non-primary strictly before every primary.
    #[test]
    fn deletion_order_is_a_replica_first_permutation(pods in arb_pod_set()) {
        let order = deletion_order(&pods);

        prop_assert_eq!(order.len(), pods.len());
        let mut input_names: Vec<&str> = pods.iter().map(|p| p.name.as_str()).collect();
        let mut output_names: Vec<&str> = order.iter().map(|p| p.name.as_str()).collect();
        input_names.sort_unstable();
        output_names.sort_unstable();
        prop_assert_eq!(input_names, output_names);

        let first_primary = order
            .iter()
            .position(|p| p.role == Some(PodRole::Primary))
            .unwrap_or(order.len());
        for pod in &order[first_primary..] {
            prop_assert_eq!(pod.role, Some(PodRole::Primary));
        }
    }

    /// Computing the order twice yields the same result.
    #[test]
    fn deletion_order_is_deterministic(pods in arb_pod_set()) {
        prop_assert_eq!(deletion_order(&pods), deletion_order(&pods));
    }

    /// The primary gate opens exactly when no non-primary pod is running.
    #[test]
    fn primary_gate_matches_running_non_primaries(pods in arb_pod_set()) {
        let any_running_non_primary = pods.iter().any(|p| {
            p.role != Some(PodRole::Primary) && p.lifecycle == PodLifecycle::Running
        });
        prop_assert_eq!(primary_may_terminate(&pods), !any_running_non_primary);
    }

    /// Sequence tokens fire iff strictly newer than the recorded one.
    #[test]
    fn sequence_tokens_fire_only_when_strictly_newer(last in 0u64..1000, seen in 0u64..1000) {
        let decision = decide(Some(&last.to_string()), &seen.to_string());
        match decision {
            TriggerDecision::Fire(_) => prop_assert!(seen > last),
            TriggerDecision::Ignore(IgnoreReason::AlreadyProcessed) => {
                prop_assert_eq!(seen, last)
            }
            TriggerDecision::Ignore(IgnoreReason::NotNewer) => prop_assert!(seen < last),
            other => prop_assert!(false, "unexpected decision {:?}", other),
        }
    }

    /// A token can fire at most once: re-deciding against the recorded value
    /// never fires again.
    #[test]
    fn recorded_token_never_refires(seen in 0u64..1000) {
        let token = seen.to_string();
        prop_assert!(matches!(decide(None, &token), TriggerDecision::Fire(_)));
        prop_assert!(matches!(
            decide(Some(&token), &token),
            TriggerDecision::Ignore(IgnoreReason::AlreadyProcessed)
        ));
    }

    /// The selector only ever picks from the offered set, deterministically,
    /// and nothing in the set beats its pick on lag.
    #[test]
    fn selector_picks_a_minimal_member(pods in arb_pod_set()) {
        let first = MostCaughtUp.select(&pods).map(|p| p.name.clone());
        let second = MostCaughtUp.select(&pods).map(|p| p.name.clone());
        prop_assert_eq!(&first, &second);

        match first {
            None => prop_assert!(pods.is_empty()),
            Some(name) => {
                let chosen = pods.iter().find(|p| p.name == name).expect("pick from set");
                let chosen_lag = chosen.lag_bytes.unwrap_or(u64::MAX);
                for pod in &pods {
                    prop_assert!(pod.lag_bytes.unwrap_or(u64::MAX) >= chosen_lag);
                }
            }
        }
    }
}
