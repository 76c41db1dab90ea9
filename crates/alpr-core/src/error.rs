//! Error types for alpr-core

use thiserror::Error;

use crate::models::ViolationId;

/// Result type alias using alpr-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in alpr-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local persistence is unavailable (unwritable medium, failed open)
    #[error("Storage fault: {0}")]
    StorageFault(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row did not match the expected schema
    #[error("Failed to decode stored violation: {0}")]
    Decode(String),

    /// Record not found
    #[error("Violation not found: {0}")]
    NotFound(String),

    /// A synced record was acknowledged again with a different remote id
    #[error("Violation {id} already synced as {existing}, refusing remote id {incoming}")]
    StateInconsistency {
        id: ViolationId,
        existing: String,
        incoming: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client construction or health check error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The sync worker task died before reporting
    #[error("Sync worker failed: {0}")]
    Worker(String),
}

impl Error {
    /// Whether this error means local state cannot be read or written.
    pub const fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Self::StorageFault(_) | Self::Sqlite(_) | Self::Io(_) | Self::Decode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_fault_classification() {
        assert!(Error::StorageFault("disk full".into()).is_storage_fault());
        assert!(Error::Decode("bad state".into()).is_storage_fault());
        assert!(!Error::InvalidInput("empty plate".into()).is_storage_fault());
        assert!(!Error::StateInconsistency {
            id: ViolationId::new(1),
            existing: "V-1".into(),
            incoming: "V-2".into(),
        }
        .is_storage_fault());
    }
}
