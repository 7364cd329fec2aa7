//! Failover orchestration
//!
//! A switchover demotes the current primary and promotes a chosen replica in
//! a fixed order: fence, promote, wait for readiness, commit. The commit is
//! the only step that writes committed role labels, and it runs under the
//! per-cluster operation lock, so observers always read at most one primary.
//!
//! Failure semantics: if the promoted replica does not report ready within
//! the configured bound, the operation aborts and restores the original
//! primary. There is no partial commit and no indefinite retry; the error
//! surfaces to the caller.

use std::cmp::Ordering;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::OperatorConfig;
use crate::controller::backend::{ClusterBackend, PodInfo, PodLifecycle};
use crate::controller::error::{Error, Result};
use crate::controller::events::{reasons, EventPublisher, LifecycleEvent};
use crate::controller::roles::PodRole;

/// Policy choosing which replica to promote.
///
/// Selection heuristics are pluggable; the orchestrator only requires that
/// the choice comes from the offered replica set.
pub trait ReplicaSelector: Send + Sync {
    fn select<'a>(&self, replicas: &'a [PodInfo]) -> Option<&'a PodInfo>;
}

/// Default policy: the most caught-up replica wins.
///
/// Replicas with reported lag sort before replicas without; ties break on
/// pod name so the choice is deterministic across passes.
pub struct MostCaughtUp;

impl ReplicaSelector for MostCaughtUp {
    fn select<'a>(&self, replicas: &'a [PodInfo]) -> Option<&'a PodInfo> {
        replicas.iter().min_by(|a, b| {
            let lag_a = a.lag_bytes.unwrap_or(u64::MAX);
            let lag_b = b.lag_bytes.unwrap_or(u64::MAX);
            match lag_a.cmp(&lag_b) {
                Ordering::Equal => a.name.cmp(&b.name),
                other => other,
            }
        })
    }
}

/// Result of a completed switchover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchoverOutcome {
    /// The demoted pod, now a replica
    pub old_primary: String,
    /// The promoted pod, now the primary
    pub new_primary: String,
}

/// Execute a planned switchover for one cluster.
///
/// Must be called with the cluster's operation lock held.
pub async fn switchover(
    cluster: &str,
    namespace: &str,
    backend: &dyn ClusterBackend,
    selector: &dyn ReplicaSelector,
    events: &dyn EventPublisher,
    config: &OperatorConfig,
) -> Result<SwitchoverOutcome> {
    // Snapshot the topology
    let pods = backend.pods().await?;

    let primaries: Vec<&PodInfo> = pods
        .iter()
        .filter(|p| p.role == Some(PodRole::Primary))
        .collect();
    let primary = match primaries.as_slice() {
        [] => return Err(Error::NoPrimary(cluster.to_string())),
        [one] => (*one).clone(),
        _ => {
            return Err(Error::ValidationError(format!(
                "cluster {} has {} primaries, refusing to switch over",
                cluster,
                primaries.len()
            )))
        }
    };

    let replicas: Vec<PodInfo> = pods
        .iter()
        .filter(|p| p.role == Some(PodRole::Replica) && p.lifecycle == PodLifecycle::Running)
        .cloned()
        .collect();
    let target = selector
        .select(&replicas)
        .ok_or_else(|| Error::NoReplica(cluster.to_string()))?
        .clone();

    info!(
        cluster,
        old_primary = %primary.name,
        new_primary = %target.name,
        "Starting switchover"
    );
    events
        .publish(LifecycleEvent::new(
            reasons::SWITCHOVER_STARTED,
            &target.name,
            namespace,
            Some(format!("Promoting {} over {}", target.name, primary.name)),
        ))
        .await;

    // Fence the old primary so it stops taking primary-role traffic
    backend.set_role(&primary.name, PodRole::Demoting).await?;

    // Promote the target and wait for it to report ready as primary
    let promotion = async {
        backend.set_role(&target.name, PodRole::Promoting).await?;
        wait_ready_as_primary(backend, &target.name, config.promotion_timeout, config).await
    }
    .await;

    if let Err(e) = promotion {
        warn!(
            cluster,
            pod = %target.name,
            error = %e,
            "Promotion failed, rolling back"
        );
        rollback(backend, &primary.name, &target.name).await;
        events
            .publish(LifecycleEvent::new(
                reasons::SWITCHOVER_ABORTED,
                &target.name,
                namespace,
                Some(format!("Promotion failed: {}; {} stays primary", e, primary.name)),
            ))
            .await;
        return Err(e);
    }

    // Commit: after this round exactly one pod reads as primary
    let demoted: Vec<String> = pods
        .iter()
        .filter(|p| p.name != target.name)
        .map(|p| p.name.clone())
        .collect();
    backend.commit_roles(&target.name, &demoted).await?;

    info!(cluster, new_primary = %target.name, "Switchover committed");
    events
        .publish(LifecycleEvent::new(
            reasons::SWITCHOVER_COMPLETE,
            &target.name,
            namespace,
            Some(format!("{} is now primary", target.name)),
        ))
        .await;

    Ok(SwitchoverOutcome {
        old_primary: primary.name,
        new_primary: target.name,
    })
}

/// Poll a pod until it reports ready as primary, bounded by `timeout`.
async fn wait_ready_as_primary(
    backend: &dyn ClusterBackend,
    pod: &str,
    timeout: Duration,
    config: &OperatorConfig,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if backend.primary_ready(pod).await? {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(Error::PromotionTimeout {
                pod: pod.to_string(),
                waited: timeout,
            });
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}

/// Restore pre-switchover roles after a failed promotion.
///
/// Restoration failures are logged but do not mask the promotion error; the
/// next reconcile pass observes the transient labels and can converge.
async fn rollback(backend: &dyn ClusterBackend, old_primary: &str, target: &str) {
    if let Err(e) = backend.set_role(old_primary, PodRole::Primary).await {
        error!(pod = old_primary, error = %e, "Failed to restore primary role during rollback");
    }
    if let Err(e) = backend.set_role(target, PodRole::Replica).await {
        error!(pod = target, error = %e, "Failed to restore replica role during rollback");
    }
}
