use std::sync::Arc;

use kube::Client;

use crate::config::OperatorConfig;
use crate::controller::events::{EventPublisher, KubeEventPublisher};
use crate::controller::locks::ClusterLocks;
use crate::health::HealthState;

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Lifecycle event sink
    pub events: Arc<dyn EventPublisher>,
    /// Per-cluster single-flight guards
    pub locks: Arc<ClusterLocks>,
    /// Operator tunables
    pub config: OperatorConfig,
    /// Optional health/metrics state
    pub health: Option<Arc<HealthState>>,
}

impl Context {
    pub fn new(client: Client, config: OperatorConfig, health: Option<Arc<HealthState>>) -> Self {
        let events = Arc::new(KubeEventPublisher::new(
            client.clone(),
            "postgres-ha-operator",
        ));
        Self {
            client,
            events,
            locks: Arc::new(ClusterLocks::new()),
            config,
            health,
        }
    }

    /// Replace the event sink; used by tests to capture events in-process.
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}
