use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation that requests a planned primary/replica switchover.
///
/// The value is an opaque trigger token (RFC 3339 timestamp or integer
/// sequence number). A switchover fires once per distinct token; see
/// `controller::trigger`.
pub const TRIGGER_SWITCHOVER_ANNOTATION: &str = "postgres-ha.example.com/trigger-switchover";

/// Pod label carrying the current role of a cluster member.
///
/// Committed values are `primary` and `replica`. The legacy spelling
/// `master` is accepted on read for compatibility with external consumers
/// that select pods by it. The transient values `demoting` and `promoting`
/// only exist while a switchover is in flight.
pub const ROLE_LABEL: &str = "postgres-ha.example.com/role";

/// Pod label linking a member pod back to its owning cluster.
pub const CLUSTER_LABEL: &str = "postgres-ha.example.com/cluster";

/// PostgresCluster is the Schema for the postgresclusters API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "postgres-ha.example.com",
    version = "v1alpha1",
    kind = "PostgresCluster",
    plural = "postgresclusters",
    shortname = "pgc",
    namespaced,
    status = "PostgresClusterStatus",
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Primary", "type":"string", "jsonPath":".status.primaryPod"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PostgresClusterSpec {
    /// Number of member pods (primary + replicas)
    /// - 1 = single server, no switchover possible
    /// - 2 = primary + one replica
    /// - 3+ = primary + multiple replicas
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// When true the operator observes but never acts on this cluster
    #[serde(default)]
    pub paused: bool,
}

fn default_replicas() -> i32 {
    2
}

/// Status of the PostgresCluster
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostgresClusterStatus {
    /// Current phase of the cluster lifecycle
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Name of the current primary pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_pod: Option<String>,

    /// Names of replica pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replica_pods: Vec<String>,

    /// Last switchover trigger token that was processed.
    ///
    /// Tokens equal to or older than this value never re-fire. The token is
    /// recorded for failed switchovers too, so a failing trigger is not
    /// retried indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_switchover: Option<String>,

    /// Observed generation of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Message describing the last operation failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Kubernetes-style conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Cluster lifecycle phase
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, Default, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Cluster is waiting for its members to appear
    #[default]
    Pending,
    /// Cluster is running with one primary and healthy replicas
    Running,
    /// A switchover is in flight
    SwitchingOver,
    /// Cluster is being torn down in replica-before-primary order
    Deleting,
    /// Last operation failed; original roles are preserved
    Failed,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterPhase::Pending => write!(f, "Pending"),
            ClusterPhase::Running => write!(f, "Running"),
            ClusterPhase::SwitchingOver => write!(f, "SwitchingOver"),
            ClusterPhase::Deleting => write!(f, "Deleting"),
            ClusterPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Kubernetes-style condition
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition: True, False, or Unknown
    pub status: String,

    /// Reason for the condition's last transition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: String,

    /// Generation observed when condition was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
