//! Status and conditions management for PostgresCluster resources
//!
//! This module provides utilities for managing Kubernetes-style conditions
//! and updating the status subresource.

use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};

use crate::controller::backend::FIELD_MANAGER;
use crate::controller::error::Result;
use crate::controller::Context;
use crate::crd::{ClusterPhase, Condition, PostgresCluster, PostgresClusterStatus};

/// Standard condition types following Kubernetes conventions
pub mod condition_types {
    /// Cluster has one ready primary
    pub const READY: &str = "Ready";
    /// An operation is in flight
    pub const PROGRESSING: &str = "Progressing";
    /// Cluster is in a degraded state but still functional
    pub const DEGRADED: &str = "Degraded";
}

/// Condition status values
pub mod condition_status {
    pub const TRUE: &str = "True";
    pub const FALSE: &str = "False";
    pub const UNKNOWN: &str = "Unknown";
}

/// Builder for creating and updating status conditions
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
    generation: Option<i64>,
}

impl ConditionBuilder {
    /// Create a new condition builder
    pub fn new(generation: Option<i64>) -> Self {
        Self {
            conditions: Vec::new(),
            generation,
        }
    }

    /// Create from existing conditions
    pub fn from_existing(existing: Vec<Condition>, generation: Option<i64>) -> Self {
        Self {
            conditions: existing,
            generation,
        }
    }

    /// Set a condition, updating if it exists or adding if it doesn't
    pub fn set_condition(mut self, type_: &str, status: &str, reason: &str, message: &str) -> Self {
        let now = Utc::now().to_rfc3339();

        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            // The transition time only moves when the status flips
            if existing.status != status {
                existing.status = status.to_string();
                existing.last_transition_time = now;
            }
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.observed_generation = self.generation;
        } else {
            self.conditions.push(Condition {
                type_: type_.to_string(),
                status: status.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: now,
                observed_generation: self.generation,
            });
        }
        self
    }

    /// Set the Ready condition
    pub fn ready(self, is_ready: bool, reason: &str, message: &str) -> Self {
        let status = if is_ready {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        };
        self.set_condition(condition_types::READY, status, reason, message)
    }

    /// Set the Progressing condition
    pub fn progressing(self, is_progressing: bool, reason: &str, message: &str) -> Self {
        let status = if is_progressing {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        };
        self.set_condition(condition_types::PROGRESSING, status, reason, message)
    }

    /// Set the Degraded condition
    pub fn degraded(self, is_degraded: bool, reason: &str, message: &str) -> Self {
        let status = if is_degraded {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        };
        self.set_condition(condition_types::DEGRADED, status, reason, message)
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

/// Status manager for PostgresCluster resources
pub struct StatusManager<'a> {
    cluster: &'a PostgresCluster,
    ctx: &'a Context,
    ns: &'a str,
}

impl<'a> StatusManager<'a> {
    /// Create a new status manager
    pub fn new(cluster: &'a PostgresCluster, ctx: &'a Context, ns: &'a str) -> Self {
        Self { cluster, ctx, ns }
    }

    /// Update the cluster status with a full status object
    pub async fn update(&self, status: PostgresClusterStatus) -> Result<()> {
        let api: Api<PostgresCluster> = Api::namespaced(self.ctx.client.clone(), self.ns);
        let name = self.cluster.name_any();

        let patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            &name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(())
    }

    fn existing(&self) -> Option<&PostgresClusterStatus> {
        self.cluster.status.as_ref()
    }

    fn existing_conditions(&self) -> Vec<Condition> {
        self.existing()
            .map(|s| s.conditions.clone())
            .unwrap_or_default()
    }

    /// Update status for a running cluster
    pub async fn set_running(
        &self,
        primary_pod: Option<String>,
        replica_pods: Vec<String>,
    ) -> Result<()> {
        let generation = self.cluster.metadata.generation;
        let conditions = ConditionBuilder::from_existing(self.existing_conditions(), generation)
            .ready(true, "ClusterReady", "Primary is serving and roles are committed")
            .progressing(false, "Stable", "No operation in flight")
            .degraded(false, "Healthy", "Cluster is healthy")
            .build();

        let status = PostgresClusterStatus {
            phase: ClusterPhase::Running,
            primary_pod,
            replica_pods,
            last_switchover: self.existing().and_then(|s| s.last_switchover.clone()),
            observed_generation: generation,
            last_error: None,
            conditions,
        };

        self.update(status).await
    }

    /// Update status while a switchover is in flight
    pub async fn set_switching_over(&self, token: &str) -> Result<()> {
        let generation = self.cluster.metadata.generation;
        let conditions = ConditionBuilder::from_existing(self.existing_conditions(), generation)
            .ready(false, "SwitchingOver", "Primary/replica roles are being swapped")
            .progressing(true, "Switchover", "Switchover in flight")
            .build();

        let status = PostgresClusterStatus {
            phase: ClusterPhase::SwitchingOver,
            primary_pod: self.existing().and_then(|s| s.primary_pod.clone()),
            replica_pods: self
                .existing()
                .map(|s| s.replica_pods.clone())
                .unwrap_or_default(),
            last_switchover: Some(token.to_string()),
            observed_generation: generation,
            last_error: None,
            conditions,
        };

        self.update(status).await
    }

    /// Update status for a cluster whose primary has not appeared yet
    pub async fn set_pending(&self) -> Result<()> {
        let generation = self.cluster.metadata.generation;
        let conditions = ConditionBuilder::from_existing(self.existing_conditions(), generation)
            .ready(false, "NoPrimary", "No pod carries the primary role yet")
            .progressing(true, "AwaitingPrimary", "Waiting for role labels to appear")
            .build();

        let status = PostgresClusterStatus {
            phase: ClusterPhase::Pending,
            primary_pod: None,
            replica_pods: vec![],
            last_switchover: self.existing().and_then(|s| s.last_switchover.clone()),
            observed_generation: generation,
            last_error: None,
            conditions,
        };

        self.update(status).await
    }

    /// Update status for a failed operation.
    ///
    /// Role state in the status is preserved: a failed switchover leaves the
    /// original primary active.
    pub async fn set_failed(&self, reason: &str, message: &str) -> Result<()> {
        let generation = self.cluster.metadata.generation;
        let conditions = ConditionBuilder::from_existing(self.existing_conditions(), generation)
            .ready(false, reason, message)
            .progressing(false, "Failed", message)
            .degraded(true, reason, message)
            .build();

        let status = PostgresClusterStatus {
            phase: ClusterPhase::Failed,
            primary_pod: self.existing().and_then(|s| s.primary_pod.clone()),
            replica_pods: self
                .existing()
                .map(|s| s.replica_pods.clone())
                .unwrap_or_default(),
            last_switchover: self.existing().and_then(|s| s.last_switchover.clone()),
            observed_generation: generation,
            last_error: Some(message.to_string()),
            conditions,
        };

        self.update(status).await
    }

    /// Update status for a cluster being torn down
    pub async fn set_deleting(&self) -> Result<()> {
        let generation = self.cluster.metadata.generation;
        let conditions = ConditionBuilder::from_existing(self.existing_conditions(), generation)
            .ready(false, "Deleting", "Cluster is being deleted")
            .progressing(true, "Terminating", "Pods are terminated replica-first")
            .build();

        let status = PostgresClusterStatus {
            phase: ClusterPhase::Deleting,
            primary_pod: None,
            replica_pods: vec![],
            last_switchover: self.existing().and_then(|s| s.last_switchover.clone()),
            observed_generation: generation,
            last_error: None,
            conditions,
        };

        self.update(status).await
    }
}

/// Check if the cluster spec has changed by comparing observed generation
pub fn spec_changed(cluster: &PostgresCluster) -> bool {
    let current_generation = cluster.metadata.generation;
    let observed_generation = cluster.status.as_ref().and_then(|s| s.observed_generation);

    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        (Some(_), None) => true, // Never observed, needs reconciliation
        _ => true,               // No generation, always reconcile
    }
}
