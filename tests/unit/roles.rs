//! Unit tests for role tracking

use crate::common::{fast_config, memory_cluster};
use postgres_ha_operator::controller::backend::{MemoryBackend, PodInfo};
use postgres_ha_operator::controller::error::Error;
use postgres_ha_operator::controller::roles::{current_role, PodRole};

#[tokio::test]
async fn reads_committed_roles() {
    let backend = memory_cluster(&[("pg-0", "master"), ("pg-1", "replica")]);
    let config = fast_config();

    let role = current_role(&backend, "pg-0", &config).await.unwrap();
    assert_eq!(role, PodRole::Primary);

    let role = current_role(&backend, "pg-1", &config).await.unwrap();
    assert_eq!(role, PodRole::Replica);
}

#[tokio::test]
async fn unpropagated_label_surfaces_after_bounded_retries() {
    let backend = MemoryBackend::new(vec![PodInfo::new("pg-0", None)]);
    let config = fast_config();

    let err = current_role(&backend, "pg-0", &config)
        .await
        .expect_err("label never appears");
    assert!(matches!(err, Error::RoleUnavailable { pod } if pod == "pg-0"));
}

#[tokio::test]
async fn missing_pod_is_reported_as_unavailable() {
    let backend = memory_cluster(&[("pg-0", "primary")]);
    let config = fast_config();

    let err = current_role(&backend, "pg-9", &config)
        .await
        .expect_err("pod does not exist");
    assert!(matches!(err, Error::RoleUnavailable { .. }));
}
