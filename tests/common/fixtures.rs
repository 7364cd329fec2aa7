//! Test fixtures and builders for PostgresCluster resources and pod sets

use std::collections::BTreeMap;
use std::time::Duration;

use kube::core::ObjectMeta;
use postgres_ha_operator::config::OperatorConfig;
use postgres_ha_operator::controller::backend::{MemoryBackend, PodInfo};
use postgres_ha_operator::controller::roles::PodRole;
use postgres_ha_operator::crd::{
    PostgresCluster, PostgresClusterSpec, PostgresClusterStatus, TRIGGER_SWITCHOVER_ANNOTATION,
};

/// Create a basic test cluster with minimal configuration
pub fn create_test_cluster(name: &str, namespace: &str, replicas: i32) -> PostgresCluster {
    PostgresCluster {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some("test-uid-12345".to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: PostgresClusterSpec {
            replicas,
            paused: false,
        },
        status: None,
    }
}

/// Attach a trigger-switchover annotation to a cluster
pub fn with_switchover_annotation(mut cluster: PostgresCluster, token: &str) -> PostgresCluster {
    let mut annotations = cluster.metadata.annotations.unwrap_or_default();
    annotations.insert(TRIGGER_SWITCHOVER_ANNOTATION.to_string(), token.to_string());
    cluster.metadata.annotations = Some(annotations);
    cluster
}

/// Attach a status with a previously processed trigger token
pub fn with_last_switchover(mut cluster: PostgresCluster, token: &str) -> PostgresCluster {
    let mut status = cluster.status.unwrap_or_default();
    status.last_switchover = Some(token.to_string());
    cluster.status = Some(status);
    cluster
}

/// Build a pod set from `(name, role label value)` pairs.
///
/// Role values go through `PodRole::parse`, so the legacy `master` spelling
/// is exercised the same way the production read path exercises it.
pub fn pod_set(pods: &[(&str, &str)]) -> Vec<PodInfo> {
    pods.iter()
        .map(|(name, role)| PodInfo::new(name, PodRole::parse(role)))
        .collect()
}

/// Memory backend pre-populated from `(name, role label value)` pairs
pub fn memory_cluster(pods: &[(&str, &str)]) -> MemoryBackend {
    MemoryBackend::new(pod_set(pods))
}

/// Operator configuration with short bounds so timeout paths finish fast
pub fn fast_config() -> OperatorConfig {
    OperatorConfig {
        promotion_timeout: Duration::from_millis(50),
        termination_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(5),
        termination_attempts: 2,
        role_read_attempts: 3,
        role_read_backoff: Duration::from_millis(1),
        ..OperatorConfig::default()
    }
}

/// A default status for assertions that need one
pub fn empty_status() -> PostgresClusterStatus {
    PostgresClusterStatus::default()
}

/// Convenience: labels map carrying a cluster + role label pair
pub fn member_labels(cluster: &str, role: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        postgres_ha_operator::crd::CLUSTER_LABEL.to_string(),
        cluster.to_string(),
    );
    labels.insert(
        postgres_ha_operator::crd::ROLE_LABEL.to_string(),
        role.to_string(),
    );
    labels
}
