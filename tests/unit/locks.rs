//! Unit tests for per-cluster single-flight behavior

use std::sync::Arc;
use std::time::Duration;

use postgres_ha_operator::controller::error::Error;
use postgres_ha_operator::controller::ClusterLocks;

#[tokio::test]
async fn second_request_during_in_flight_operation_is_rejected() {
    let locks = Arc::new(ClusterLocks::new());

    let guard = locks.try_begin("default", "pg").expect("first acquires");

    // Simulate an in-flight operation holding the guard across awaits
    let locks_clone = locks.clone();
    let contender = tokio::spawn(async move {
        // The contender must be rejected immediately, not queued
        locks_clone.try_begin("default", "pg")
    });

    let result = contender.await.unwrap();
    assert!(matches!(result, Err(Error::ConcurrencyConflict { .. })));

    drop(guard);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(locks.try_begin("default", "pg").is_ok());
}

#[tokio::test]
async fn operations_on_different_clusters_run_concurrently() {
    let locks = ClusterLocks::new();

    let _a = locks.try_begin("ns-1", "pg").expect("cluster a");
    let _b = locks.try_begin("ns-2", "pg").expect("cluster b");
    let _c = locks.try_begin("ns-1", "other").expect("cluster c");
}

#[test]
fn conflict_error_names_the_cluster() {
    let locks = ClusterLocks::new();
    let _guard = locks.try_begin("default", "pg").unwrap();

    match locks.try_begin("default", "pg") {
        Err(Error::ConcurrencyConflict { cluster }) => assert_eq!(cluster, "default/pg"),
        Err(other) => panic!("expected ConcurrencyConflict, got {:?}", other),
        Ok(_) => panic!("expected ConcurrencyConflict, lock acquired"),
    }
}
