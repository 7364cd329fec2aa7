//! Role tracking for cluster member pods
//!
//! The role of a pod is carried by the `postgres-ha.example.com/role` label.
//! Reads tolerate labels that have not propagated yet by retrying with
//! bounded backoff instead of failing the caller. Reading never mutates
//! anything; role labels are only written by the failover orchestrator's
//! commit step or by initial provisioning.

use std::fmt;

use tracing::debug;

use crate::config::OperatorConfig;
use crate::controller::backend::ClusterBackend;
use crate::controller::error::{Error, Result};

/// Committed label value written for the primary.
pub const VALUE_PRIMARY: &str = "primary";
/// Legacy spelling of the primary role, accepted on read.
pub const VALUE_MASTER: &str = "master";
/// Label value for replicas.
pub const VALUE_REPLICA: &str = "replica";
/// Transient value while the old primary is fenced.
pub const VALUE_DEMOTING: &str = "demoting";
/// Transient value while the promotion target comes up.
pub const VALUE_PROMOTING: &str = "promoting";

/// Role of a cluster member pod.
///
/// `Demoting` and `Promoting` only exist inside an in-flight switchover;
/// at any committed point in time every pod is `Primary` or `Replica` and
/// exactly one pod per cluster is `Primary`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PodRole {
    Primary,
    Replica,
    Demoting,
    Promoting,
}

impl PodRole {
    /// Parse a role label value. `master` parses as `Primary` for
    /// compatibility with consumers that select pods by the legacy label.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            VALUE_PRIMARY | VALUE_MASTER => Some(PodRole::Primary),
            VALUE_REPLICA => Some(PodRole::Replica),
            VALUE_DEMOTING => Some(PodRole::Demoting),
            VALUE_PROMOTING => Some(PodRole::Promoting),
            _ => None,
        }
    }

    /// The label value written for this role.
    pub fn label_value(&self) -> &'static str {
        match self {
            PodRole::Primary => VALUE_PRIMARY,
            PodRole::Replica => VALUE_REPLICA,
            PodRole::Demoting => VALUE_DEMOTING,
            PodRole::Promoting => VALUE_PROMOTING,
        }
    }

    /// Whether this is a committed role rather than a transient one.
    pub fn is_committed(&self) -> bool {
        matches!(self, PodRole::Primary | PodRole::Replica)
    }
}

impl fmt::Display for PodRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_value())
    }
}

/// Read the current role of a pod, retrying while the label has not
/// propagated yet.
///
/// Retries `config.role_read_attempts` times with a doubling delay starting
/// at `config.role_read_backoff`, then surfaces [`Error::RoleUnavailable`].
pub async fn current_role(
    backend: &dyn ClusterBackend,
    pod: &str,
    config: &OperatorConfig,
) -> Result<PodRole> {
    let mut delay = config.role_read_backoff;

    for attempt in 0..config.role_read_attempts {
        let pods = backend.pods().await?;
        if let Some(role) = pods.iter().find(|p| p.name == pod).and_then(|p| p.role) {
            return Ok(role);
        }

        debug!(pod, attempt, "Role label not observed yet, retrying");
        tokio::time::sleep(delay).await;
        delay *= 2;
    }

    Err(Error::RoleUnavailable {
        pod: pod.to_string(),
    })
}
