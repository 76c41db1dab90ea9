//! Shared outbox store used by the capture front-end and the sync engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::{Database, OutboxRepository, SqliteOutboxRepository, StoreStats};
use crate::models::{CycleReport, RemoteReceipt, Violation, ViolationId, ViolationPayload};
use crate::search::ViolationQuery;
use crate::{Error, Result};

/// Thread-safe handle to the local outbox.
///
/// Every operation runs under one lock, so a capture insert never observes
/// or interleaves with a half-applied engine update.
#[derive(Clone)]
pub struct OutboxStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl OutboxStore {
    /// Open the outbox at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::StorageFault(format!("cannot create {}: {error}", parent.display()))
            })?;
        }

        let db = Database::open(&db_path)?;
        tracing::debug!("Opened outbox at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory outbox (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Location of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn with_repo<T>(
        &self,
        operation: impl FnOnce(&SqliteOutboxRepository<'_>) -> Result<T>,
    ) -> Result<T> {
        let db = self.db.lock().await;
        let repo = SqliteOutboxRepository::new(db.connection());
        operation(&repo)
    }

    /// Validate and durably persist a new pending violation.
    pub async fn insert(&self, payload: ViolationPayload) -> Result<ViolationId> {
        let payload = payload.validate()?;
        let id = self.with_repo(|repo| repo.insert(&payload)).await?;
        tracing::debug!("Recorded violation {id} for plate {}", payload.plate_number);
        Ok(id)
    }

    /// Fetch a violation by id.
    pub async fn get(&self, id: ViolationId) -> Result<Option<Violation>> {
        self.with_repo(|repo| repo.get(id)).await
    }

    /// Snapshot of pending violations, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<Violation>> {
        self.with_repo(|repo| repo.list_pending()).await
    }

    /// Violations parked in the terminal failed state.
    pub async fn list_failed(&self) -> Result<Vec<Violation>> {
        self.with_repo(|repo| repo.list_failed()).await
    }

    /// Full history, newest first.
    pub async fn list_all(&self, limit: usize, offset: usize) -> Result<Vec<Violation>> {
        self.with_repo(|repo| repo.list_all(limit, offset)).await
    }

    /// Record the remote acknowledgement of a violation.
    pub async fn mark_synced(&self, id: ViolationId, receipt: &RemoteReceipt) -> Result<()> {
        self.with_repo(|repo| repo.mark_synced(id, receipt)).await
    }

    /// Count a failed attempt, keeping the violation pending.
    pub async fn increment_attempt(&self, id: ViolationId, error: Option<&str>) -> Result<()> {
        self.with_repo(|repo| repo.increment_attempt(id, error)).await
    }

    /// Count a failed attempt and park the violation as failed.
    pub async fn mark_failed(&self, id: ViolationId, reason: &str) -> Result<()> {
        self.with_repo(|repo| repo.mark_failed(id, reason)).await
    }

    /// Return one failed violation to the pending queue.
    pub async fn requeue_failed(&self, id: ViolationId) -> Result<bool> {
        self.with_repo(|repo| repo.requeue_failed(id)).await
    }

    /// Return every failed violation to the pending queue.
    pub async fn requeue_all_failed(&self) -> Result<usize> {
        self.with_repo(|repo| repo.requeue_all_failed()).await
    }

    /// Pending count for display.
    pub async fn count_pending(&self) -> Result<u64> {
        self.with_repo(|repo| repo.count_pending()).await
    }

    /// Counts per sync state.
    pub async fn stats(&self) -> Result<StoreStats> {
        self.with_repo(|repo| repo.stats()).await
    }

    /// Delete synced violations captured before `cutoff`.
    pub async fn purge_synced_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let purged = self
            .with_repo(|repo| repo.purge_synced_older_than(cutoff))
            .await?;
        if purged > 0 {
            tracing::info!("Purged {purged} synced violations captured before {cutoff}");
        }
        Ok(purged)
    }

    /// History lookup.
    pub async fn search(&self, query: &ViolationQuery) -> Result<Vec<Violation>> {
        self.with_repo(|repo| repo.search(query)).await
    }

    /// Append a finished cycle to the run log.
    pub async fn record_cycle(&self, report: &CycleReport) -> Result<()> {
        self.with_repo(|repo| repo.record_cycle(report)).await
    }

    /// Most recently finished cycle.
    pub async fn last_cycle(&self) -> Result<Option<CycleReport>> {
        self.with_repo(|repo| repo.last_cycle()).await
    }
}
