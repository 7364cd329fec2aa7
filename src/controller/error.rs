//! Error types for the PostgresCluster controller

use std::time::Duration;

use thiserror::Error;

/// Validation problems are recovered locally, promotion and deletion
/// timeouts surface to the caller, and concurrency conflicts are rejected
/// outright.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Role label unavailable for pod {pod}")]
    RoleUnavailable { pod: String },

    #[error("Cluster {0} has no primary pod")]
    NoPrimary(String),

    #[error("Cluster {0} has no replica eligible for promotion")]
    NoReplica(String),

    #[error("Promotion of {pod} did not become ready within {waited:?}")]
    PromotionTimeout { pod: String, waited: Duration },

    #[error("Termination unacknowledged for pods {pods:?} after {waited:?}")]
    DeletionTimeout { pods: Vec<String>, waited: Duration },

    #[error("Another operation is already in flight for cluster {cluster}")]
    ConcurrencyConflict { cluster: String },
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(e) => match e {
                kube::Error::Api(api_err) => {
                    // 4xx errors (except 409 Conflict, 429 TooManyRequests)
                    // are usually not retryable; 5xx errors are
                    let code = api_err.code;
                    if (400..500).contains(&code) {
                        code == 409 || code == 429
                    } else {
                        true
                    }
                }
                _ => true,
            },
            // A busy cluster lock frees up once the in-flight operation ends
            Error::ConcurrencyConflict { .. } => true,
            // The label may simply not have propagated yet
            Error::RoleUnavailable { .. } => true,
            // Topology errors resolve once provisioning catches up
            Error::NoPrimary(_) | Error::NoReplica(_) => true,
            // Timeouts already exhausted their bounded retries
            Error::PromotionTimeout { .. } => false,
            Error::DeletionTimeout { .. } => false,
            Error::ValidationError(_) => false,
            Error::SerializationError(_) => false,
            Error::MissingObjectKey(_) => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exponential backoff configuration
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Initial delay for first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300), // 5 minutes
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Calculate the backoff delay for a given retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);

        // Apply jitter
        let jitter_range = base_delay_secs * self.jitter;
        let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let delay_with_jitter = (base_delay_secs + jitter).max(0.0);

        // Cap at max delay
        let capped_delay = delay_with_jitter.min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(capped_delay)
    }

    /// Get the delay for an error, with different handling for retryable vs non-retryable
    pub fn delay_for_error(&self, error: &Error, attempt: u32) -> Duration {
        if error.is_retryable() {
            self.delay_for_attempt(attempt)
        } else {
            // Non-retryable errors wait out the full delay so that manual
            // intervention has a chance to land
            self.max_delay
        }
    }
}
