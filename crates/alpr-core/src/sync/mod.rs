//! Delivery of pending violations to the remote authority
//!
//! - [`SyncClient`] is the transport seam; [`HttpSyncClient`] is the
//!   production implementation.
//! - [`SyncEngine`] runs one cycle over the pending snapshot.
//! - [`SyncCoordinator`] makes sure at most one cycle runs at a time and
//!   that a cycle survives its caller going away.

mod client;
mod coordinator;
mod engine;
mod http;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{SubmitOutcome, SyncClient};
pub use coordinator::{SyncCoordinator, SyncStatus, TriggerOutcome};
pub use engine::{retention_cutoff, SyncEngine, SyncPolicy};
pub use http::{HealthStatus, HttpClientConfig, HttpSyncClient};
