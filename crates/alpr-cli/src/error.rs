use std::io;

use alpr_core::models::GENERIC_FAILURE_MESSAGE;
use alpr_core::ViolationId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] alpr_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid violation id: '{0}'")]
    InvalidId(String),
    #[error("Violation not found: {0}")]
    NotFound(ViolationId),
    #[error("Invalid time '{0}': expected YYYY-MM-DD or RFC 3339")]
    InvalidTime(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Device id is not configured. Run `alpr config init` or set ALPR_DEVICE_ID.")]
    DeviceNotConfigured,
    #[error(
        "Officer name is not configured. Pass --officer, set ALPR_OFFICER, or run `alpr config init --officer <NAME>`."
    )]
    OfficerNotConfigured,
    #[error("Nothing to retry: pass a violation id or --all")]
    RetryTargetMissing,
    #[error("Another alpr daemon is already running")]
    DaemonAlreadyRunning,
    #[error("Instance lock error: {0}")]
    InstanceLock(String),
    #[error("{}", GENERIC_FAILURE_MESSAGE)]
    CycleFailed,
}
