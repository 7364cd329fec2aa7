mod postgres_cluster;

pub use postgres_cluster::{
    ClusterPhase, Condition, PostgresCluster, PostgresClusterSpec, PostgresClusterStatus,
    CLUSTER_LABEL, ROLE_LABEL, TRIGGER_SWITCHOVER_ANNOTATION,
};
