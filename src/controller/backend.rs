//! Cluster backend abstraction
//!
//! The failover orchestrator and deletion sequencer act on a cluster's pod
//! set through [`ClusterBackend`] so that the orchestration logic is
//! independent of the Kubernetes plumbing. [`KubeBackend`] is the production
//! implementation; tests drive the same code paths with an in-memory backend.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

use crate::controller::error::Result;
use crate::controller::roles::PodRole;
use crate::crd::{CLUSTER_LABEL, ROLE_LABEL};

/// Field manager used for all pod patches issued by the operator.
pub const FIELD_MANAGER: &str = "postgres-ha-operator";

/// Annotation on member pods reporting replication lag in bytes.
///
/// Maintained by the in-pod HA agent; consumed by the default replica
/// selection policy. Absent on the primary and on replicas that have not
/// reported yet.
pub const LAG_ANNOTATION: &str = "postgres-ha.example.com/replication-lag-bytes";

/// Lifecycle state of a member pod during teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodLifecycle {
    Running,
    Terminating,
    Deleted,
}

/// Observed state of one member pod.
#[derive(Clone, Debug, PartialEq)]
pub struct PodInfo {
    /// Stable pod name
    pub name: String,
    /// Current role, `None` while the label has not propagated
    pub role: Option<PodRole>,
    /// Lifecycle state
    pub lifecycle: PodLifecycle,
    /// Reported replication lag in bytes, if any
    pub lag_bytes: Option<u64>,
}

impl PodInfo {
    pub fn new(name: &str, role: Option<PodRole>) -> Self {
        Self {
            name: name.to_string(),
            role,
            lifecycle: PodLifecycle::Running,
            lag_bytes: None,
        }
    }
}

/// Operations the control loops need against a cluster's pod set.
///
/// Reads are snapshots; all role mutation goes through `set_role` and
/// `commit_roles`, and the orchestration layer guarantees a single writer
/// per cluster at a time.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Snapshot of the cluster's member pods. Pods that are gone entirely
    /// are not listed; callers treat absence as `Deleted`.
    async fn pods(&self) -> Result<Vec<PodInfo>>;

    /// Write a role label on one pod.
    async fn set_role(&self, pod: &str, role: PodRole) -> Result<()>;

    /// Commit the final role assignment after a successful promotion.
    ///
    /// Issued as one uninterrupted patch round by the single writer: the new
    /// primary first, then every demoted member, so that no point in the
    /// sequence reads as two primaries.
    async fn commit_roles(&self, primary: &str, replicas: &[String]) -> Result<()>;

    /// Whether the pod reports ready to serve as primary.
    async fn primary_ready(&self, pod: &str) -> Result<bool>;

    /// Issue termination for a pod. Fire-and-forget; acknowledgement is
    /// observed through `pods()`. Terminating an already-gone pod is not an
    /// error.
    async fn terminate(&self, pod: &str) -> Result<()>;
}

/// Production backend acting on the Kubernetes API.
pub struct KubeBackend {
    pods: Api<Pod>,
    cluster: String,
}

impl KubeBackend {
    pub fn new(client: Client, namespace: &str, cluster: &str) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
            cluster: cluster.to_string(),
        }
    }

    fn selector(&self) -> String {
        format!("{}={}", CLUSTER_LABEL, self.cluster)
    }
}

#[async_trait]
impl ClusterBackend for KubeBackend {
    async fn pods(&self) -> Result<Vec<PodInfo>> {
        let listed = self
            .pods
            .list(&ListParams::default().labels(&self.selector()))
            .await?;

        Ok(listed
            .items
            .iter()
            .filter_map(|pod| {
                let name = pod.metadata.name.clone()?;
                let role = pod
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(ROLE_LABEL))
                    .and_then(|v| PodRole::parse(v));
                let lifecycle = if pod.metadata.deletion_timestamp.is_some() {
                    PodLifecycle::Terminating
                } else {
                    PodLifecycle::Running
                };
                let lag_bytes = pod
                    .metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(LAG_ANNOTATION))
                    .and_then(|v| v.parse().ok());
                Some(PodInfo {
                    name,
                    role,
                    lifecycle,
                    lag_bytes,
                })
            })
            .collect())
    }

    async fn set_role(&self, pod: &str, role: PodRole) -> Result<()> {
        let patch = json!({
            "metadata": {
                "labels": {
                    ROLE_LABEL: role.label_value()
                }
            }
        });

        self.pods
            .patch(pod, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        debug!(pod, %role, "Wrote role label");

        Ok(())
    }

    async fn commit_roles(&self, primary: &str, replicas: &[String]) -> Result<()> {
        self.set_role(primary, PodRole::Primary).await?;
        for replica in replicas {
            self.set_role(replica, PodRole::Replica).await?;
        }
        Ok(())
    }

    async fn primary_ready(&self, pod: &str) -> Result<bool> {
        let Some(pod) = self.pods.get_opt(pod).await? else {
            return Ok(false);
        };

        let ready = pod
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false);

        Ok(ready)
    }

    async fn terminate(&self, pod: &str) -> Result<()> {
        match self.pods.delete(pod, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Already gone counts as acknowledged
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory backend for tests.
///
/// Pods live in a plain map; readiness and termination acknowledgement are
/// controlled through [`MemoryBackend::mark_ready`] and
/// [`MemoryBackend::mark_stuck`].
#[derive(Default)]
pub struct MemoryBackend {
    state: std::sync::Mutex<Vec<PodInfo>>,
    ready: std::sync::Mutex<std::collections::HashSet<String>>,
    stuck: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl MemoryBackend {
    pub fn new(pods: Vec<PodInfo>) -> Self {
        Self {
            state: std::sync::Mutex::new(pods),
            ..Default::default()
        }
    }

    /// Make a pod report ready-as-primary once promoted.
    pub fn mark_ready(&self, pod: &str) {
        self.ready.lock().unwrap().insert(pod.to_string());
    }

    /// Make a pod's termination never acknowledge.
    pub fn mark_stuck(&self, pod: &str) {
        self.stuck.lock().unwrap().insert(pod.to_string());
    }

    /// Current pod set, including terminating pods.
    pub fn snapshot(&self) -> Vec<PodInfo> {
        self.state.lock().unwrap().clone()
    }

    /// Role of a pod as currently stored, if the pod still exists.
    pub fn role_of(&self, pod: &str) -> Option<PodRole> {
        self.state
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == pod)
            .and_then(|p| p.role)
    }
}

#[async_trait]
impl ClusterBackend for MemoryBackend {
    async fn pods(&self) -> Result<Vec<PodInfo>> {
        Ok(self.snapshot())
    }

    async fn set_role(&self, pod: &str, role: PodRole) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(info) = state.iter_mut().find(|p| p.name == pod) {
            info.role = Some(role);
        }
        Ok(())
    }

    async fn commit_roles(&self, primary: &str, replicas: &[String]) -> Result<()> {
        self.set_role(primary, PodRole::Primary).await?;
        for replica in replicas {
            self.set_role(replica, PodRole::Replica).await?;
        }
        Ok(())
    }

    async fn primary_ready(&self, pod: &str) -> Result<bool> {
        Ok(self.ready.lock().unwrap().contains(pod))
    }

    async fn terminate(&self, pod: &str) -> Result<()> {
        if self.stuck.lock().unwrap().contains(pod) {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        if let Some(info) = state.iter_mut().find(|p| p.name == pod) {
            info.lifecycle = PodLifecycle::Terminating;
        }
        Ok(())
    }
}
