//! Lifecycle event recording
//!
//! Ordered `Killing` events for pods are the externally observable contract
//! of cluster teardown, so event publication goes through a trait that the
//! deletion sequencer and failover orchestrator share. The production
//! implementation wraps `kube::runtime::events::Recorder`; a memory
//! implementation records events in-process for tests.
//!
//! Events are fire-and-forget: a failed publish is logged and never fails
//! the surrounding operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Well-known event reason strings.
///
/// These appear in `kubectl get events` under the REASON column.
pub mod reasons {
    /// Pod termination has been issued; marks the beginning of teardown
    /// for that pod. Issuance order between pods is the ordering contract.
    pub const KILLING: &str = "Killing";
    /// A planned switchover has started
    pub const SWITCHOVER_STARTED: &str = "SwitchoverStarted";
    /// Roles were committed; exactly one pod reads as primary again
    pub const SWITCHOVER_COMPLETE: &str = "SwitchoverComplete";
    /// Promotion failed or timed out; original roles were restored
    pub const SWITCHOVER_ABORTED: &str = "SwitchoverAborted";
}

/// A timestamped record of a pod state transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Machine-readable reason (e.g. `Killing`)
    pub reason: String,
    /// Name of the pod the event is about
    pub pod: String,
    /// Namespace of the pod
    pub namespace: String,
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,
    /// Optional human-readable note
    pub note: Option<String>,
}

impl LifecycleEvent {
    pub fn new(reason: &str, pod: &str, namespace: &str, note: Option<String>) -> Self {
        Self {
            reason: reason.to_string(),
            pod: pod.to_string(),
            namespace: namespace.to_string(),
            timestamp: Utc::now(),
            note,
        }
    }
}

/// Trait for publishing lifecycle events.
///
/// Implementations must preserve call order for events on distinct pods of
/// the same cluster; callers rely on issuance order.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: LifecycleEvent);
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher for the given controller name.
    ///
    /// The controller name appears as the reportingComponent on Events.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, event: LifecycleEvent) {
        let reference = ObjectReference {
            kind: Some("Pod".to_string()),
            name: Some(event.pod.clone()),
            namespace: Some(event.namespace.clone()),
            ..Default::default()
        };
        let type_ = if event.reason == reasons::SWITCHOVER_ABORTED {
            EventType::Warning
        } else {
            EventType::Normal
        };
        let k8s_event = kube::runtime::events::Event {
            type_,
            reason: event.reason.clone(),
            note: event.note.clone(),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&k8s_event, &reference).await {
            warn!(
                reason = %event.reason,
                pod = %event.pod,
                error = %e,
                "Failed to publish lifecycle event"
            );
        }
    }
}

/// In-process implementation that records events in publication order.
///
/// Used by unit tests asserting event ordering, and usable as a no-op sink.
#[derive(Default)]
pub struct MemoryEventPublisher {
    events: std::sync::Mutex<Vec<LifecycleEvent>>,
}

impl MemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events in publication order.
    pub fn recorded(&self) -> Vec<LifecycleEvent> {
        self.events.lock().expect("event log poisoned").clone()
    }

    /// Recorded events filtered to a single reason, in publication order.
    pub fn recorded_with_reason(&self, reason: &str) -> Vec<LifecycleEvent> {
        self.recorded()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryEventPublisher {
    async fn publish(&self, event: LifecycleEvent) {
        self.events.lock().expect("event log poisoned").push(event);
    }
}
