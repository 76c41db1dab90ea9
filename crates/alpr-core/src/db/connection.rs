//! Database connection management

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// How long a writer waits on a locked database file before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database wrapper for the local outbox file
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the outbox database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|error| {
            Error::StorageFault(format!("cannot open {}: {error}", path.display()))
        })?;

        let database = Self { conn };
        database.configure(true)?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let database = Self { conn };
        database.configure(false)?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` so a returned write has reached the disk
    fn configure(&self, on_disk: bool) -> Result<()> {
        if on_disk {
            let mode: String = self.conn.pragma_update_and_check(
                None,
                "journal_mode",
                "WAL",
                |row| row.get(0),
            )?;
            if !mode.eq_ignore_ascii_case("wal") {
                tracing::warn!("WAL journal unavailable, running with journal_mode={mode}");
            }
        }
        // FULL: the WAL is fsynced on every commit, not only at checkpoints
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
