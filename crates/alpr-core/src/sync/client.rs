use async_trait::async_trait;

use crate::models::{RemoteReceipt, ViolationPayload};

/// Result of submitting a single violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The authority recorded the violation.
    Accepted(RemoteReceipt),
    /// The authority refused the payload; resubmitting it unchanged will not help.
    Rejected { reason: String },
    /// The authority could not be reached or did not answer usefully.
    Unreachable { cause: String },
}

impl SubmitOutcome {
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Transport used by the sync engine.
///
/// Implementations never fail: every transport problem is folded into
/// [`SubmitOutcome::Unreachable`].
#[async_trait]
pub trait SyncClient: Send + Sync {
    async fn submit(&self, payload: &ViolationPayload) -> SubmitOutcome;
}
