//! alpr-core - Core library for the ALPR outbox
//!
//! This crate contains the violation models, the durable local store, and
//! the sync engine that delivers captured violations to the remote
//! authority. Used by the `alpr` CLI, which acts as capture front-end and
//! scheduling host.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod search;
pub mod services;
pub mod sync;
pub mod util;

pub use config::SyncSettings;
pub use error::{Error, Result};
pub use models::{GeoPoint, RemoteReceipt, SyncState, Violation, ViolationId, ViolationPayload};
pub use services::OutboxStore;
pub use sync::{SyncCoordinator, SyncEngine, TriggerOutcome};
