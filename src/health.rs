//! Health server for Kubernetes probes and Prometheus metrics
//!
//! Provides HTTP endpoints for:
//! - `/healthz` - Liveness probe (is the process alive?)
//! - `/readyz` - Readiness probe (is the operator ready to act?)
//! - `/metrics` - Prometheus metrics

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// Port the health server listens on
const HEALTH_PORT: u16 = 8081;

/// Labels for per-cluster operation metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct OperationLabels {
    pub namespace: String,
    pub name: String,
}

impl prometheus_client::encoding::EncodeLabelSet for OperationLabels {
    fn encode(
        &self,
        encoder: &mut prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Operator metrics
pub struct Metrics {
    pub reconciliations: Family<OperationLabels, Counter>,
    pub switchovers: Family<OperationLabels, Counter>,
    pub switchover_failures: Family<OperationLabels, Counter>,
    pub ordered_deletions: Family<OperationLabels, Counter>,
}

impl Metrics {
    fn register(registry: &mut Registry) -> Self {
        let reconciliations = Family::<OperationLabels, Counter>::default();
        registry.register(
            "reconciliations",
            "Reconciliation passes per cluster",
            reconciliations.clone(),
        );

        let switchovers = Family::<OperationLabels, Counter>::default();
        registry.register(
            "switchovers",
            "Completed switchovers per cluster",
            switchovers.clone(),
        );

        let switchover_failures = Family::<OperationLabels, Counter>::default();
        registry.register(
            "switchover_failures",
            "Aborted or failed switchovers per cluster",
            switchover_failures.clone(),
        );

        let ordered_deletions = Family::<OperationLabels, Counter>::default();
        registry.register(
            "ordered_deletions",
            "Completed ordered teardowns per cluster",
            ordered_deletions.clone(),
        );

        Self {
            reconciliations,
            switchovers,
            switchover_failures,
            ordered_deletions,
        }
    }
}

/// Shared health and metrics state
pub struct HealthState {
    ready: RwLock<bool>,
    registry: Registry,
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("postgres_ha_operator");
        let metrics = Metrics::register(&mut registry);
        Self {
            ready: RwLock::new(false),
            registry,
            metrics,
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Run the health server until the process exits.
pub async fn run_health_server(state: Arc<HealthState>) -> std::io::Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state);

    let listener = TcpListener::bind(("0.0.0.0", HEALTH_PORT)).await?;
    tracing::info!(port = HEALTH_PORT, "Health server listening");
    axum::serve(listener, app).await
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(State(state): State<Arc<HealthState>>) -> Response {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
