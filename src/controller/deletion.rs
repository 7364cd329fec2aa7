//! Ordered cluster teardown
//!
//! Deleting the primary while replicas still stream from it risks an
//! unplanned promotion race and a write-loss window, so teardown terminates
//! every replica before the primary: replicas get their termination issued
//! first (with a `Killing` event at issuance), and the primary's termination
//! is gated until every replica has at least reached `terminating`.
//!
//! The `Killing` event timestamp for each replica is therefore never later
//! than the primary's; that ordering is the externally observable contract.

use tracing::{info, warn};

use crate::config::OperatorConfig;
use crate::controller::backend::{ClusterBackend, PodInfo, PodLifecycle};
use crate::controller::error::{Error, Result};
use crate::controller::events::{reasons, EventPublisher, LifecycleEvent};
use crate::controller::roles::PodRole;

/// What a completed teardown did, in issuance order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Pods whose termination was issued, in order
    pub terminated: Vec<String>,
}

/// Compute the termination issuance order for a pod set.
///
/// Every non-primary pod comes first in stable name order; primaries come
/// last. Pods with an unknown or transient role are treated as non-primary,
/// which keeps them on the safe (early) side of the primary.
pub fn deletion_order(pods: &[PodInfo]) -> Vec<PodInfo> {
    let mut non_primary: Vec<PodInfo> = pods
        .iter()
        .filter(|p| p.role != Some(PodRole::Primary))
        .cloned()
        .collect();
    non_primary.sort_by(|a, b| a.name.cmp(&b.name));

    let mut primaries: Vec<PodInfo> = pods
        .iter()
        .filter(|p| p.role == Some(PodRole::Primary))
        .cloned()
        .collect();
    primaries.sort_by(|a, b| a.name.cmp(&b.name));

    non_primary.into_iter().chain(primaries).collect()
}

/// Whether the primary may begin terminating: every other pod must have at
/// least reached `terminating` (or be gone).
pub fn primary_may_terminate(pods: &[PodInfo]) -> bool {
    pods.iter()
        .filter(|p| p.role != Some(PodRole::Primary))
        .all(|p| p.lifecycle != PodLifecycle::Running)
}

/// Tear down a cluster's pod set in replica-before-primary order.
///
/// Must be called with the cluster's operation lock held. Termination
/// requests are fire-and-forget but issuance order is preserved; waits are
/// bounded and surface [`Error::DeletionTimeout`] naming the pods that were
/// not seen terminating.
pub async fn delete_cluster(
    cluster: &str,
    namespace: &str,
    backend: &dyn ClusterBackend,
    events: &dyn EventPublisher,
    config: &OperatorConfig,
) -> Result<DeletionReport> {
    let pods = backend.pods().await?;
    if pods.is_empty() {
        return Ok(DeletionReport::default());
    }

    let order = deletion_order(&pods);
    let replica_names: Vec<String> = order
        .iter()
        .filter(|p| p.role != Some(PodRole::Primary))
        .map(|p| p.name.clone())
        .collect();
    let primary_names: Vec<String> = order
        .iter()
        .filter(|p| p.role == Some(PodRole::Primary))
        .map(|p| p.name.clone())
        .collect();

    info!(
        cluster,
        replicas = replica_names.len(),
        primaries = primary_names.len(),
        "Tearing down cluster in replica-before-primary order"
    );

    let mut report = DeletionReport::default();

    // Issue replica terminations first, Killing at issuance
    for pod in &replica_names {
        issue_termination(backend, events, pod, namespace, config).await?;
        report.terminated.push(pod.clone());
    }

    // Gate: the primary may not start terminating until every replica has
    // at least reached terminating
    wait_replicas_terminating(cluster, backend, config).await?;

    for pod in &primary_names {
        issue_termination(backend, events, pod, namespace, config).await?;
        report.terminated.push(pod.clone());
    }

    // The primary's acknowledgement is bounded too; an unacknowledged
    // termination is a fatal cluster-deletion error naming the pod
    wait_all_terminating(cluster, backend, config).await?;

    info!(cluster, "Teardown issued for all pods");
    Ok(report)
}

/// Issue one pod's termination with bounded retries, then emit `Killing`.
async fn issue_termination(
    backend: &dyn ClusterBackend,
    events: &dyn EventPublisher,
    pod: &str,
    namespace: &str,
    config: &OperatorConfig,
) -> Result<()> {
    let mut last_err = None;
    for attempt in 0..config.termination_attempts {
        match backend.terminate(pod).await {
            Ok(()) => {
                events
                    .publish(LifecycleEvent::new(reasons::KILLING, pod, namespace, None))
                    .await;
                return Ok(());
            }
            Err(e) => {
                warn!(pod, attempt, error = %e, "Termination request failed, retrying");
                last_err = Some(e);
                tokio::time::sleep(config.backoff.delay_for_attempt(attempt)).await;
            }
        }
    }

    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Wait until every non-primary pod has left `Running`.
async fn wait_replicas_terminating(
    cluster: &str,
    backend: &dyn ClusterBackend,
    config: &OperatorConfig,
) -> Result<()> {
    wait_terminating(cluster, backend, config, |p| {
        p.role != Some(PodRole::Primary)
    })
    .await
}

/// Wait until every pod has left `Running`.
async fn wait_all_terminating(
    cluster: &str,
    backend: &dyn ClusterBackend,
    config: &OperatorConfig,
) -> Result<()> {
    wait_terminating(cluster, backend, config, |_| true).await
}

async fn wait_terminating<F>(
    cluster: &str,
    backend: &dyn ClusterBackend,
    config: &OperatorConfig,
    relevant: F,
) -> Result<()>
where
    F: Fn(&PodInfo) -> bool,
{
    let deadline = tokio::time::Instant::now() + config.termination_timeout;

    loop {
        let pods = backend.pods().await?;
        let still_running: Vec<String> = pods
            .iter()
            .filter(|p| relevant(p) && p.lifecycle == PodLifecycle::Running)
            .map(|p| p.name.clone())
            .collect();

        if still_running.is_empty() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(cluster, pods = ?still_running, "Termination unacknowledged within bound");
            return Err(Error::DeletionTimeout {
                pods: still_running,
                waited: config.termination_timeout,
            });
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}
