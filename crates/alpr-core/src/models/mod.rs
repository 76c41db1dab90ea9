//! Data models for the ALPR outbox

mod sync_run;
mod violation;

pub use sync_run::{CycleReport, CycleSummary, TriggerOrigin, GENERIC_FAILURE_MESSAGE};
pub use violation::{
    normalize_plate, GeoPoint, RemoteReceipt, SyncState, Violation, ViolationId, ViolationPayload,
};
