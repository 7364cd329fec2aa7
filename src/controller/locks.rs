//! Per-cluster single-flight guard
//!
//! Within one cluster, switchover and deletion sequencing are mutually
//! exclusive: a second operation attempted while one is in flight is
//! rejected immediately with [`Error::ConcurrencyConflict`], never queued.
//! Operations on different clusters proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::controller::error::{Error, Result};

/// Map of per-cluster operation locks, keyed by `namespace/name`.
#[derive(Default)]
pub struct ClusterLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one cluster operation. Dropping it releases the
/// cluster for the next operation.
pub struct OperationGuard {
    _guard: OwnedMutexGuard<()>,
}

impl ClusterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin an operation on a cluster, or reject if one is in flight.
    pub fn try_begin(&self, namespace: &str, name: &str) -> Result<OperationGuard> {
        let key = format!("{}/{}", namespace, name);
        let lock = {
            let mut locks = self.locks.lock().expect("lock map poisoned");
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        match lock.try_lock_owned() {
            Ok(guard) => Ok(OperationGuard { _guard: guard }),
            Err(_) => Err(Error::ConcurrencyConflict { cluster: key }),
        }
    }
}
