//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Apply a migration's statements in one transaction
fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in statements {
        tx.execute_batch(stmt)?;
    }
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: Initial outbox table
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // AUTOINCREMENT so ids of purged rows are never handed out again
            "CREATE TABLE IF NOT EXISTS pending_violations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plate_number TEXT NOT NULL,
                violation_type TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                latitude REAL,
                longitude REAL,
                image_path TEXT,
                confidence REAL NOT NULL,
                officer_name TEXT NOT NULL,
                device_id TEXT NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0,
                sync_attempts INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_violations_plate ON pending_violations(plate_number)",
        ],
    )
}

/// Migration to version 2: explicit sync state and remote receipt
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "ALTER TABLE pending_violations
                ADD COLUMN state TEXT NOT NULL DEFAULT 'pending'
                CHECK (state IN ('pending', 'synced', 'failed'))",
            "ALTER TABLE pending_violations ADD COLUMN remote_id TEXT",
            "ALTER TABLE pending_violations ADD COLUMN fine_amount INTEGER",
            "ALTER TABLE pending_violations ADD COLUMN remote_status TEXT",
            "ALTER TABLE pending_violations ADD COLUMN accepted_at INTEGER",
            "ALTER TABLE pending_violations ADD COLUMN last_attempt_at INTEGER",
            "ALTER TABLE pending_violations ADD COLUMN last_error TEXT",
            // Rows acknowledged before v2 never stored a remote id
            "UPDATE pending_violations
                SET state = 'synced', remote_id = 'legacy-' || id
                WHERE synced = 1",
            "CREATE INDEX IF NOT EXISTS idx_violations_state_timestamp
                ON pending_violations(state, timestamp, id)",
        ],
    )
}

/// Migration to version 3: sync cycle log
fn migrate_v3(conn: &Connection) -> Result<()> {
    apply(
        conn,
        3,
        &[
            "CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                origin TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                rejected INTEGER NOT NULL DEFAULT 0,
                inconsistent INTEGER NOT NULL DEFAULT 0,
                purged INTEGER NOT NULL DEFAULT 0,
                error TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_runs_finished ON sync_runs(finished_at DESC)",
        ],
    )
}
