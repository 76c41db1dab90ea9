//! Outbox repository implementation

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::models::{
    CycleReport, CycleSummary, GeoPoint, RemoteReceipt, SyncState, TriggerOrigin, Violation,
    ViolationId, ViolationPayload,
};
use crate::search::ViolationQuery;

/// Column list shared by every violation `SELECT`
const VIOLATION_COLUMNS: &str = "id, plate_number, violation_type, timestamp, latitude, longitude,
    image_path, confidence, officer_name, device_id, synced, sync_attempts, state, remote_id,
    fine_amount, remote_status, accepted_at, last_attempt_at, last_error";

/// Per-state record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub pending: u64,
    pub synced: u64,
    pub failed: u64,
}

impl StoreStats {
    /// Records the remote authority has not acknowledged.
    pub const fn unsynced(&self) -> u64 {
        self.pending + self.failed
    }
}

/// Trait for outbox storage operations
pub trait OutboxRepository {
    /// Persist a new pending violation
    fn insert(&self, payload: &ViolationPayload) -> Result<ViolationId>;

    /// Get a violation by ID
    fn get(&self, id: ViolationId) -> Result<Option<Violation>>;

    /// Pending violations, oldest capture first
    fn list_pending(&self) -> Result<Vec<Violation>>;

    /// Terminally failed violations, oldest capture first
    fn list_failed(&self) -> Result<Vec<Violation>>;

    /// All violations, newest capture first
    fn list_all(&self, limit: usize, offset: usize) -> Result<Vec<Violation>>;

    /// Transition a violation to synced and stamp the remote receipt
    fn mark_synced(&self, id: ViolationId, receipt: &RemoteReceipt) -> Result<()>;

    /// Count a failed submission; the violation stays pending
    fn increment_attempt(&self, id: ViolationId, error: Option<&str>) -> Result<()>;

    /// Count a failed submission and stop retrying the violation
    fn mark_failed(&self, id: ViolationId, reason: &str) -> Result<()>;

    /// Move one failed violation back to pending
    fn requeue_failed(&self, id: ViolationId) -> Result<bool>;

    /// Move every failed violation back to pending
    fn requeue_all_failed(&self) -> Result<usize>;

    /// Number of pending violations
    fn count_pending(&self) -> Result<u64>;

    /// Counts per sync state
    fn stats(&self) -> Result<StoreStats>;

    /// Delete synced violations captured before `cutoff`
    fn purge_synced_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// History lookup
    fn search(&self, query: &ViolationQuery) -> Result<Vec<Violation>>;

    /// Append a cycle to the sync run log
    fn record_cycle(&self, report: &CycleReport) -> Result<()>;

    /// Most recently finished cycle
    fn last_cycle(&self) -> Result<Option<CycleReport>>;
}

/// `SQLite` implementation of `OutboxRepository`
pub struct SqliteOutboxRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOutboxRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_violations(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Violation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ViolationRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ViolationRow::decode).collect()
    }

    fn list_by_state_oldest_first(&self, state: SyncState) -> Result<Vec<Violation>> {
        self.query_violations(
            &format!(
                "SELECT {VIOLATION_COLUMNS} FROM pending_violations
                 WHERE state = ?1
                 ORDER BY timestamp ASC, id ASC"
            ),
            params![state.as_str()],
        )
    }
}

impl OutboxRepository for SqliteOutboxRepository<'_> {
    fn insert(&self, payload: &ViolationPayload) -> Result<ViolationId> {
        let (latitude, longitude) = payload
            .location
            .map_or((None, None), |point| (Some(point.latitude), Some(point.longitude)));

        self.conn.execute(
            "INSERT INTO pending_violations (
                plate_number, violation_type, timestamp, latitude, longitude, image_path,
                confidence, officer_name, device_id, synced, sync_attempts, state
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, 'pending')",
            params![
                payload.plate_number,
                payload.violation_type,
                payload.captured_at.timestamp_millis(),
                latitude,
                longitude,
                payload.image_path,
                payload.confidence,
                payload.officer_name,
                payload.device_id,
            ],
        )?;

        Ok(ViolationId::new(self.conn.last_insert_rowid()))
    }

    fn get(&self, id: ViolationId) -> Result<Option<Violation>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {VIOLATION_COLUMNS} FROM pending_violations WHERE id = ?1"),
                params![id.get()],
                ViolationRow::from_row,
            )
            .optional()?;

        row.map(ViolationRow::decode).transpose()
    }

    fn list_pending(&self) -> Result<Vec<Violation>> {
        self.list_by_state_oldest_first(SyncState::Pending)
    }

    fn list_failed(&self) -> Result<Vec<Violation>> {
        self.list_by_state_oldest_first(SyncState::Failed)
    }

    fn list_all(&self, limit: usize, offset: usize) -> Result<Vec<Violation>> {
        self.query_violations(
            &format!(
                "SELECT {VIOLATION_COLUMNS} FROM pending_violations
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?1 OFFSET ?2"
            ),
            params![to_sql_count(limit), to_sql_count(offset)],
        )
    }

    fn mark_synced(&self, id: ViolationId, receipt: &RemoteReceipt) -> Result<()> {
        if receipt.remote_id.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "violation {id}: remote id must not be empty"
            )));
        }

        let rows = self.conn.execute(
            "UPDATE pending_violations
             SET state = 'synced', synced = 1, remote_id = ?1, fine_amount = ?2,
                 remote_status = ?3, accepted_at = ?4, last_error = NULL
             WHERE id = ?5 AND state != 'synced'",
            params![
                receipt.remote_id,
                receipt.fine_amount,
                receipt.status,
                receipt.accepted_at.map(|at| at.timestamp_millis()),
                id.get(),
            ],
        )?;

        if rows == 1 {
            return Ok(());
        }

        let existing: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT remote_id FROM pending_violations WHERE id = ?1",
                params![id.get()],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                tracing::debug!("Violation {id} no longer exists; treating as resolved");
                Ok(())
            }
            Some(Some(existing)) if existing == receipt.remote_id => {
                tracing::debug!("Violation {id} already synced as {existing}");
                Ok(())
            }
            Some(existing) => Err(Error::StateInconsistency {
                id,
                existing: existing.unwrap_or_default(),
                incoming: receipt.remote_id.clone(),
            }),
        }
    }

    fn increment_attempt(&self, id: ViolationId, error: Option<&str>) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE pending_violations
             SET sync_attempts = sync_attempts + 1, last_attempt_at = ?1, last_error = ?2
             WHERE id = ?3 AND state = 'pending'",
            params![Utc::now().timestamp_millis(), error, id.get()],
        )?;

        if rows == 0 {
            tracing::debug!("Violation {id} is not pending; attempt not recorded");
        }
        Ok(())
    }

    fn mark_failed(&self, id: ViolationId, reason: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE pending_violations
             SET state = 'failed', sync_attempts = sync_attempts + 1,
                 last_attempt_at = ?1, last_error = ?2
             WHERE id = ?3 AND state = 'pending'",
            params![Utc::now().timestamp_millis(), reason, id.get()],
        )?;

        if rows == 0 {
            tracing::debug!("Violation {id} is not pending; failure not recorded");
        }
        Ok(())
    }

    fn requeue_failed(&self, id: ViolationId) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE pending_violations SET state = 'pending'
             WHERE id = ?1 AND state = 'failed'",
            params![id.get()],
        )?;
        Ok(rows == 1)
    }

    fn requeue_all_failed(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE pending_violations SET state = 'pending' WHERE state = 'failed'",
            [],
        )?;
        Ok(rows)
    }

    fn count_pending(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pending_violations WHERE state = 'pending'",
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn stats(&self) -> Result<StoreStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM pending_violations GROUP BY state")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stats = StoreStats::default();
        for (state, count) in counts {
            let count = u64::try_from(count).unwrap_or_default();
            match state.parse::<SyncState>()? {
                SyncState::Pending => stats.pending = count,
                SyncState::Synced => stats.synced = count,
                SyncState::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }

    fn purge_synced_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM pending_violations WHERE state = 'synced' AND timestamp < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(rows)
    }

    fn search(&self, query: &ViolationQuery) -> Result<Vec<Violation>> {
        let (clause, mut values) = query.to_sql();
        values.push(rusqlite::types::Value::Integer(to_sql_count(query.limit)));
        values.push(rusqlite::types::Value::Integer(to_sql_count(query.offset)));

        self.query_violations(
            &format!(
                "SELECT {VIOLATION_COLUMNS} FROM pending_violations
                 WHERE {clause}
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ? OFFSET ?"
            ),
            params_from_iter(values),
        )
    }

    fn record_cycle(&self, report: &CycleReport) -> Result<()> {
        let summary = report.summary().copied().unwrap_or_default();
        self.conn.execute(
            "INSERT INTO sync_runs (
                origin, started_at, finished_at, synced, failed, rejected, inconsistent,
                purged, error
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                report.origin.as_str(),
                report.started_at.timestamp_millis(),
                report.finished_at.timestamp_millis(),
                summary.synced,
                summary.failed,
                summary.rejected,
                summary.inconsistent,
                summary.purged,
                report.outcome.as_ref().err(),
            ],
        )?;
        Ok(())
    }

    fn last_cycle(&self) -> Result<Option<CycleReport>> {
        let row = self
            .conn
            .query_row(
                "SELECT origin, started_at, finished_at, synced, failed, rejected,
                        inconsistent, purged, error
                 FROM sync_runs
                 ORDER BY finished_at DESC, id DESC
                 LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        CycleSummary {
                            synced: row.get(3)?,
                            failed: row.get(4)?,
                            rejected: row.get(5)?,
                            inconsistent: row.get(6)?,
                            purged: row.get(7)?,
                        },
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((origin, started_at, finished_at, summary, error)) = row else {
            return Ok(None);
        };

        Ok(Some(CycleReport {
            origin: origin.parse::<TriggerOrigin>()?,
            started_at: millis_to_datetime(started_at, "started_at")?,
            finished_at: millis_to_datetime(finished_at, "finished_at")?,
            outcome: error.map_or(Ok(summary), Err),
        }))
    }
}

/// Raw column values of one `pending_violations` row, read by name
struct ViolationRow {
    id: i64,
    plate_number: String,
    violation_type: String,
    timestamp: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    image_path: Option<String>,
    confidence: f64,
    officer_name: String,
    device_id: String,
    synced: i64,
    sync_attempts: i64,
    state: String,
    remote_id: Option<String>,
    fine_amount: Option<i64>,
    remote_status: Option<String>,
    accepted_at: Option<i64>,
    last_attempt_at: Option<i64>,
    last_error: Option<String>,
}

impl ViolationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            plate_number: row.get("plate_number")?,
            violation_type: row.get("violation_type")?,
            timestamp: row.get("timestamp")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            image_path: row.get("image_path")?,
            confidence: row.get("confidence")?,
            officer_name: row.get("officer_name")?,
            device_id: row.get("device_id")?,
            synced: row.get("synced")?,
            sync_attempts: row.get("sync_attempts")?,
            state: row.get("state")?,
            remote_id: row.get("remote_id")?,
            fine_amount: row.get("fine_amount")?,
            remote_status: row.get("remote_status")?,
            accepted_at: row.get("accepted_at")?,
            last_attempt_at: row.get("last_attempt_at")?,
            last_error: row.get("last_error")?,
        })
    }

    /// Validate the row and build the domain value.
    fn decode(self) -> Result<Violation> {
        let id = ViolationId::new(self.id);
        let state: SyncState = self.state.parse()?;

        if (state == SyncState::Synced) != (self.synced == 1) {
            return Err(Error::Decode(format!(
                "violation {id}: state '{state}' disagrees with synced flag {}",
                self.synced
            )));
        }

        let remote = match (state, self.remote_id) {
            (SyncState::Synced, Some(remote_id)) if !remote_id.is_empty() => {
                Some(RemoteReceipt {
                    remote_id,
                    fine_amount: self.fine_amount,
                    status: self.remote_status,
                    accepted_at: self
                        .accepted_at
                        .map(|at| millis_to_datetime(at, "accepted_at"))
                        .transpose()?,
                })
            }
            (SyncState::Synced, _) => {
                return Err(Error::Decode(format!(
                    "violation {id}: synced without a remote id"
                )));
            }
            (_, Some(remote_id)) => {
                return Err(Error::Decode(format!(
                    "violation {id}: {state} but carries remote id {remote_id}"
                )));
            }
            (_, None) => None,
        };

        let attempt_count = u32::try_from(self.sync_attempts).map_err(|_| {
            Error::Decode(format!(
                "violation {id}: invalid attempt count {}",
                self.sync_attempts
            ))
        })?;

        let payload = ViolationPayload {
            plate_number: self.plate_number,
            violation_type: self.violation_type,
            captured_at: millis_to_datetime(self.timestamp, "timestamp")?,
            confidence: self.confidence,
            location: GeoPoint::from_parts(self.latitude, self.longitude),
            image_path: self.image_path,
            officer_name: self.officer_name,
            device_id: self.device_id,
        };

        Ok(Violation {
            id,
            payload,
            state,
            remote,
            attempt_count,
            last_attempt_at: self
                .last_attempt_at
                .map(|at| millis_to_datetime(at, "last_attempt_at"))
                .transpose()?,
            last_error: self.last_error,
        })
    }
}

fn millis_to_datetime(millis: i64, field: &str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::Decode(format!("{field} out of range: {millis}")))
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
