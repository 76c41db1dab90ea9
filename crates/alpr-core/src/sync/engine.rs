//! One pass of the outbox drain

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::client::{SubmitOutcome, SyncClient};
use crate::config::{DEFAULT_PACING_MS, DEFAULT_RETENTION_DAYS};
use crate::error::{Error, Result};
use crate::models::{CycleSummary, Violation};
use crate::services::OutboxStore;
use crate::util::compact_text;

/// Knobs of a sync cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Pause between two submissions
    pub pacing: Duration,
    /// Synced violations captured longer ago than this are purged
    pub retention: chrono::Duration,
    /// Move rejected violations to the failed state
    pub terminal_on_reject: bool,
    /// Give up on a violation after this many failed attempts
    pub max_unreachable_attempts: Option<u32>,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(DEFAULT_PACING_MS),
            retention: chrono::Duration::days(i64::from(DEFAULT_RETENTION_DAYS)),
            terminal_on_reject: true,
            max_unreachable_attempts: None,
        }
    }
}

/// Capture-time cutoff for the retention purge.
///
/// Fails with [`Error::Config`] when the window reaches past the
/// representable time range.
pub fn retention_cutoff(
    now: DateTime<Utc>,
    retention: chrono::Duration,
) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(retention).ok_or_else(|| {
        Error::Config(format!(
            "retention of {} days is out of range",
            retention.num_days()
        ))
    })
}

/// Drains the pending snapshot through a [`SyncClient`].
///
/// Records are handled one at a time in capture order. A record only
/// becomes synced after the authority accepted it, so an interrupted
/// cycle at worst resubmits a record on the next run.
#[derive(Clone)]
pub struct SyncEngine {
    store: OutboxStore,
    client: Arc<dyn SyncClient>,
    policy: SyncPolicy,
}

impl SyncEngine {
    pub fn new(store: OutboxStore, client: Arc<dyn SyncClient>, policy: SyncPolicy) -> Self {
        Self {
            store,
            client,
            policy,
        }
    }

    pub const fn store(&self) -> &OutboxStore {
        &self.store
    }

    pub const fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Run one cycle.
    ///
    /// Submission failures are counted in the summary. Only a storage
    /// fault aborts the cycle, leaving every unhandled record pending.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let cutoff = retention_cutoff(Utc::now(), self.policy.retention)?;
        let pending = self.store.list_pending().await?;
        let mut summary = CycleSummary::default();

        if pending.is_empty() {
            debug!("No pending violations to sync");
        } else {
            info!("Found {} pending violations", pending.len());
            let last = pending.len() - 1;
            for (index, violation) in pending.iter().enumerate() {
                self.deliver(violation, &mut summary).await?;
                if index < last && !self.policy.pacing.is_zero() {
                    tokio::time::sleep(self.policy.pacing).await;
                }
            }
        }

        summary.purged = self.purge_expired(cutoff).await?;

        if summary.attempted() > 0 {
            info!("Sync complete. {summary}");
        }
        Ok(summary)
    }

    async fn deliver(&self, violation: &Violation, summary: &mut CycleSummary) -> Result<()> {
        match self.client.submit(&violation.payload).await {
            SubmitOutcome::Accepted(receipt) if receipt.remote_id.trim().is_empty() => {
                self.reject(violation, "accepted without a remote id", summary)
                    .await?;
            }
            SubmitOutcome::Accepted(receipt) => {
                match self.store.mark_synced(violation.id, &receipt).await {
                    Ok(()) => {
                        summary.synced += 1;
                        debug!(
                            "Synced violation {} as {}",
                            violation.id, receipt.remote_id
                        );
                    }
                    Err(error @ Error::StateInconsistency { .. }) => {
                        summary.inconsistent += 1;
                        warn!("{error}");
                    }
                    Err(error) => return Err(error),
                }
            }
            SubmitOutcome::Rejected { reason } => {
                self.reject(violation, &reason, summary).await?;
            }
            SubmitOutcome::Unreachable { cause } => {
                summary.failed += 1;
                let cause = compact_text(&cause);
                let attempts = violation.attempt_count.saturating_add(1);
                if self
                    .policy
                    .max_unreachable_attempts
                    .is_some_and(|limit| attempts >= limit)
                {
                    warn!(
                        "Giving up on violation {} after {attempts} attempts: {cause}",
                        violation.id
                    );
                    self.store
                        .mark_failed(
                            violation.id,
                            &format!("gave up after {attempts} attempts: {cause}"),
                        )
                        .await?;
                } else {
                    warn!("Failed to sync violation {}: {cause}", violation.id);
                    self.store
                        .increment_attempt(violation.id, Some(&cause))
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn reject(
        &self,
        violation: &Violation,
        reason: &str,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        summary.rejected += 1;
        let reason = compact_text(reason);
        if self.policy.terminal_on_reject {
            warn!("Violation {} rejected: {reason}", violation.id);
            self.store.mark_failed(violation.id, &reason).await
        } else {
            warn!("Violation {} rejected, will retry: {reason}", violation.id);
            self.store
                .increment_attempt(violation.id, Some(&reason))
                .await
        }
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u32> {
        let purged = self.store.purge_synced_older_than(cutoff).await?;
        Ok(u32::try_from(purged).unwrap_or(u32::MAX))
    }
}
