//! Sync cycle summary and run log models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Message shown to users when a cycle could not run.
pub const GENERIC_FAILURE_MESSAGE: &str = "Sync failed, will retry";

/// Who asked for a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOrigin {
    /// User action from the UI
    Manual,
    /// Periodic scheduling host
    Scheduled,
}

impl TriggerOrigin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(Error::Decode(format!("unknown trigger origin '{other}'"))),
        }
    }
}

/// Aggregated result of one sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Records acknowledged by the remote authority
    pub synced: u32,
    /// Records that hit a transient failure
    pub failed: u32,
    /// Records the remote authority refused
    pub rejected: u32,
    /// Acknowledgements that contradicted local state
    pub inconsistent: u32,
    /// Synced records reclaimed by the retention purge
    pub purged: u32,
}

impl CycleSummary {
    /// Number of records submitted during the cycle.
    pub const fn attempted(&self) -> u32 {
        self.synced + self.failed + self.rejected + self.inconsistent
    }

    /// Whether the scheduler should retry the cycle early.
    ///
    /// True only when a submission failed and nothing got through.
    /// Duplicate acknowledgements are not failures.
    pub const fn is_retryable(&self) -> bool {
        self.synced == 0 && self.failed + self.rejected > 0
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed",
            self.synced,
            self.failed + self.rejected
        )
    }
}

/// Record of a finished (or aborted) cycle, kept for status display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub origin: TriggerOrigin,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Summary on success; error text when the cycle aborted
    pub outcome: Result<CycleSummary, String>,
}

impl CycleReport {
    pub fn summary(&self) -> Option<&CycleSummary> {
        self.outcome.as_ref().ok()
    }

    /// Short text safe to show non-technical users.
    pub fn user_message(&self) -> String {
        match &self.outcome {
            Ok(summary) => summary.to_string(),
            Err(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let summary = CycleSummary {
            synced: 3,
            failed: 1,
            rejected: 2,
            ..Default::default()
        };
        assert_eq!(summary.to_string(), "3 succeeded, 3 failed");
    }

    #[test]
    fn test_summary_retryable() {
        assert!(!CycleSummary::default().is_retryable());

        let all_failed = CycleSummary {
            failed: 2,
            rejected: 1,
            ..Default::default()
        };
        assert!(all_failed.is_retryable());

        let partial = CycleSummary {
            synced: 1,
            failed: 4,
            ..Default::default()
        };
        assert!(!partial.is_retryable());

        let duplicates_only = CycleSummary {
            inconsistent: 2,
            ..Default::default()
        };
        assert_eq!(duplicates_only.attempted(), 2);
        assert!(!duplicates_only.is_retryable());
    }

    #[test]
    fn test_report_summary_on_success() {
        let now = Utc::now();
        let summary = CycleSummary {
            synced: 2,
            ..Default::default()
        };
        let report = CycleReport {
            origin: TriggerOrigin::Manual,
            started_at: now,
            finished_at: now,
            outcome: Ok(summary),
        };
        assert_eq!(report.summary(), Some(&summary));
        assert_eq!(report.user_message(), "2 succeeded, 0 failed");
    }

    #[test]
    fn test_report_user_message_hides_error_detail() {
        let now = Utc::now();
        let report = CycleReport {
            origin: TriggerOrigin::Scheduled,
            started_at: now,
            finished_at: now,
            outcome: Err("SQLite error: disk I/O error".into()),
        };
        assert_eq!(report.user_message(), GENERIC_FAILURE_MESSAGE);
        assert!(report.summary().is_none());
    }
}
