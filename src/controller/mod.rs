pub mod backend;
pub mod context;
pub mod deletion;
pub mod error;
pub mod events;
pub mod locks;
pub mod reconciler;
pub mod roles;
pub mod status;
pub mod switchover;
pub mod trigger;

pub use context::Context;
pub use error::{BackoffConfig, Error, Result};
pub use locks::ClusterLocks;
pub use reconciler::{error_policy, reconcile, FINALIZER};
pub use status::{spec_changed, ConditionBuilder, StatusManager};
