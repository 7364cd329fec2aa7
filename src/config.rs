//! Operator configuration
//!
//! All tunables live in an explicit [`OperatorConfig`] that is built once in
//! `main` and passed through the controller [`Context`](crate::controller::Context).
//! There is no process-wide mutable flag state.

use std::time::Duration;

use crate::controller::BackoffConfig;

/// Tunables for the switchover and deletion control loops.
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Upper bound on waiting for a promoted replica to report ready as
    /// primary. Exceeding it aborts the switchover and rolls back.
    pub promotion_timeout: Duration,

    /// Upper bound on waiting for issued terminations to be acknowledged
    /// during ordered cluster deletion.
    pub termination_timeout: Duration,

    /// Interval between readiness / termination acknowledgement polls.
    pub poll_interval: Duration,

    /// Bounded retries for issuing one pod's termination request.
    pub termination_attempts: u32,

    /// Bounded retries when a pod's role label has not propagated yet.
    pub role_read_attempts: u32,

    /// Base delay between role label reads; doubles per attempt.
    pub role_read_backoff: Duration,

    /// Backoff used by the controller error policy.
    pub backoff: BackoffConfig,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            promotion_timeout: Duration::from_secs(60),
            termination_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
            termination_attempts: 3,
            role_read_attempts: 5,
            role_read_backoff: Duration::from_millis(200),
            backoff: BackoffConfig::default(),
        }
    }
}

impl OperatorConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Recognized variables (all in whole seconds):
    /// `PROMOTION_TIMEOUT_SECS`, `TERMINATION_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_secs("PROMOTION_TIMEOUT_SECS") {
            config.promotion_timeout = secs;
        }
        if let Some(secs) = env_secs("TERMINATION_TIMEOUT_SECS") {
            config.termination_timeout = secs;
        }

        config
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
