//! Reconciliation logic for PostgresCluster resources
//!
//! One observation handles, in priority order: cluster deletion (ordered
//! teardown), finalizer bookkeeping, switchover trigger evaluation, and
//! plain role observation. Switchover and teardown both run under the
//! per-cluster operation lock, so at most one operation is in flight per
//! cluster while different clusters proceed concurrently.

use std::sync::Arc;
use std::time::Duration;

use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::controller::backend::{ClusterBackend, FIELD_MANAGER, KubeBackend};
use crate::controller::context::Context;
use crate::controller::deletion::delete_cluster;
use crate::controller::error::{Error, Result};
use crate::controller::status::StatusManager;
use crate::controller::switchover::{switchover, MostCaughtUp};
use crate::controller::trigger::{self, TriggerDecision};
use crate::crd::{PostgresCluster, TRIGGER_SWITCHOVER_ANNOTATION};
use crate::health::OperationLabels;
use crate::controller::roles::PodRole;

/// Finalizer that keeps the resource around until ordered teardown is done
pub const FINALIZER: &str = "postgres-ha.example.com/finalizer";

/// Main reconciliation function
#[instrument(skip(cluster, ctx), fields(name = %cluster.name_any(), namespace = cluster.namespace().unwrap_or_default()))]
pub async fn reconcile(cluster: Arc<PostgresCluster>, ctx: Arc<Context>) -> Result<Action> {
    let ns = cluster.namespace().unwrap_or_default();
    let name = cluster.name_any();

    if let Some(health) = &ctx.health {
        health
            .metrics
            .reconciliations
            .get_or_create(&labels(&ns, &name))
            .inc();
    }

    // Deletion takes priority over everything else
    if cluster.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&cluster, &ctx, &ns).await;
    }

    // Ensure finalizer is present so teardown ordering is enforceable
    if !has_finalizer(&cluster) {
        add_finalizer(&cluster, &ctx, &ns).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    if cluster.spec.paused {
        debug!("Cluster is paused, observing only");
        return Ok(Action::requeue(Duration::from_secs(60)));
    }

    // Evaluate the switchover trigger annotation, if any
    if let Some(value) = cluster
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(TRIGGER_SWITCHOVER_ANNOTATION))
    {
        let last = cluster
            .status
            .as_ref()
            .and_then(|s| s.last_switchover.as_deref());

        match trigger::decide(last, value) {
            TriggerDecision::Fire(_) => {
                return handle_switchover(&cluster, &ctx, &ns, value).await;
            }
            TriggerDecision::Ignore(reason) => {
                debug!(?reason, token = %value, "Switchover trigger not firing");
            }
        }
    }

    // Plain pass: refresh observed roles in the status
    observe_roles(&cluster, &ctx, &ns).await?;
    Ok(Action::requeue(Duration::from_secs(30)))
}

/// Error policy for the controller with exponential backoff
pub fn error_policy(cluster: Arc<PostgresCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = cluster.name_any();
    let delay = ctx.config.backoff.delay_for_error(error, 0);

    if error.is_retryable() {
        warn!(
            "Retryable error for {}: {:?}, requeuing in {:?}",
            name, error, delay
        );
    } else {
        error!(
            "Non-retryable error for {}: {:?}, requeuing in {:?} for manual intervention",
            name, error, delay
        );
    }

    Action::requeue(delay)
}

/// Run a triggered switchover under the cluster's operation lock.
async fn handle_switchover(
    cluster: &PostgresCluster,
    ctx: &Context,
    ns: &str,
    token: &str,
) -> Result<Action> {
    let name = cluster.name_any();

    // Single-flight: an in-flight operation rejects this pass outright; the
    // trigger is re-evaluated on a later pass once the lock frees up
    let _guard = ctx.locks.try_begin(ns, &name)?;

    info!(token, "Switchover trigger fired");
    let status_manager = StatusManager::new(cluster, ctx, ns);

    // Record the token before acting: the same token must never fire a
    // second orchestration run, even if this one fails
    status_manager.set_switching_over(token).await?;

    let backend = KubeBackend::new(ctx.client.clone(), ns, &name);
    let result = switchover(
        &name,
        ns,
        &backend,
        &MostCaughtUp,
        ctx.events.as_ref(),
        &ctx.config,
    )
    .await;

    match result {
        Ok(outcome) => {
            if let Some(health) = &ctx.health {
                health
                    .metrics
                    .switchovers
                    .get_or_create(&labels(ns, &name))
                    .inc();
            }

            let replicas = replica_names(&backend, &outcome.new_primary).await;
            status_manager
                .set_running(Some(outcome.new_primary), replicas)
                .await?;
            Ok(Action::requeue(Duration::from_secs(30)))
        }
        Err(e) => {
            if let Some(health) = &ctx.health {
                health
                    .metrics
                    .switchover_failures
                    .get_or_create(&labels(ns, &name))
                    .inc();
            }

            // The original primary stays active; surface the failure
            let _ = status_manager
                .set_failed("SwitchoverFailed", &e.to_string())
                .await;
            Err(e)
        }
    }
}

/// Handle deletion of the PostgresCluster with ordered teardown.
async fn handle_deletion(cluster: &PostgresCluster, ctx: &Context, ns: &str) -> Result<Action> {
    let name = cluster.name_any();

    if !has_finalizer(cluster) {
        // Nothing left to order; let garbage collection finish
        return Ok(Action::await_change());
    }

    // Teardown and switchover are mutually exclusive per cluster
    let _guard = ctx.locks.try_begin(ns, &name)?;

    info!("Handling deletion of {}", name);
    let status_manager = StatusManager::new(cluster, ctx, ns);
    let _ = status_manager.set_deleting().await;

    let backend = KubeBackend::new(ctx.client.clone(), ns, &name);
    delete_cluster(&name, ns, &backend, ctx.events.as_ref(), &ctx.config).await?;

    if let Some(health) = &ctx.health {
        health
            .metrics
            .ordered_deletions
            .get_or_create(&labels(ns, &name))
            .inc();
    }

    remove_finalizer(cluster, ctx, ns).await?;
    Ok(Action::await_change())
}

/// Refresh the status with the currently observed role assignment.
async fn observe_roles(cluster: &PostgresCluster, ctx: &Context, ns: &str) -> Result<()> {
    let name = cluster.name_any();
    let backend = KubeBackend::new(ctx.client.clone(), ns, &name);
    let pods = backend.pods().await?;

    let primary = pods
        .iter()
        .find(|p| p.role == Some(PodRole::Primary))
        .map(|p| p.name.clone());
    let replicas: Vec<String> = pods
        .iter()
        .filter(|p| p.role == Some(PodRole::Replica))
        .map(|p| p.name.clone())
        .collect();

    let status_manager = StatusManager::new(cluster, ctx, ns);
    match primary {
        Some(primary) => status_manager.set_running(Some(primary), replicas).await,
        None => status_manager.set_pending().await,
    }
}

async fn replica_names(backend: &dyn ClusterBackend, primary: &str) -> Vec<String> {
    match backend.pods().await {
        Ok(pods) => pods
            .iter()
            .filter(|p| p.name != primary)
            .map(|p| p.name.clone())
            .collect(),
        Err(_) => vec![],
    }
}

fn labels(ns: &str, name: &str) -> OperationLabels {
    OperationLabels {
        namespace: ns.to_string(),
        name: name.to_string(),
    }
}

/// Check if the finalizer is present
fn has_finalizer(cluster: &PostgresCluster) -> bool {
    cluster
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&FINALIZER.to_string()))
}

/// Add the finalizer to the resource
async fn add_finalizer(cluster: &PostgresCluster, ctx: &Context, ns: &str) -> Result<()> {
    let api: Api<PostgresCluster> = Api::namespaced(ctx.client.clone(), ns);
    let name = cluster.name_any();

    let patch = serde_json::json!({
        "metadata": {
            "finalizers": [FINALIZER]
        }
    });

    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    info!("Added finalizer to {}", name);
    Ok(())
}

/// Remove the finalizer after teardown completed
async fn remove_finalizer(cluster: &PostgresCluster, ctx: &Context, ns: &str) -> Result<()> {
    let api: Api<PostgresCluster> = Api::namespaced(ctx.client.clone(), ns);
    let name = cluster.name_any();

    let patch = serde_json::json!({
        "metadata": {
            "finalizers": null
        }
    });

    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    info!("Removed finalizer from {}", name);
    Ok(())
}
