// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for the PostgreSQL HA operator
//!
//! This target covers:
//! - Trigger evaluation (idempotence, monotonicity)
//! - Role tracking with bounded retries
//! - Single-flight guarantees
//! - Switchover and ordered-deletion orchestration over the memory backend
//! - Status/condition management

#[path = "../common/mod.rs"]
mod common;

mod locks;
mod roles;
mod scenario;
mod status;
mod trigger;
