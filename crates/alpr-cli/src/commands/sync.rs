use std::path::Path;

use alpr_core::models::TriggerOrigin;
use alpr_core::{SyncSettings, TriggerOutcome};
use serde::Serialize;

use crate::commands::common::{
    acquire_cycle_lock, build_coordinator, cycle_to_item, open_store, CycleItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncResultItem {
    pub status: &'static str,
    pub message: String,
    pub cycle: Option<CycleItem>,
}

pub async fn run_sync(
    as_json: bool,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let (coordinator, _client) = build_coordinator(store, settings)?;

    let outcome = match acquire_cycle_lock(db_path)? {
        Some(_lock) => coordinator.trigger_sync(TriggerOrigin::Manual).await?,
        None => TriggerOutcome::AlreadyRunning,
    };

    let item = sync_result_item(&outcome);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("{}", item.message);
    }

    match outcome {
        TriggerOutcome::Completed(report) if report.outcome.is_err() => Err(CliError::CycleFailed),
        _ => Ok(()),
    }
}

pub fn sync_result_item(outcome: &TriggerOutcome) -> SyncResultItem {
    let status = match outcome {
        TriggerOutcome::Completed(report) if report.outcome.is_ok() => "completed",
        TriggerOutcome::Completed(_) => "failed",
        TriggerOutcome::AlreadyRunning => "already_running",
        TriggerOutcome::Skipped => "skipped",
    };
    let cycle = match outcome {
        TriggerOutcome::Completed(report) => Some(cycle_to_item(report)),
        TriggerOutcome::AlreadyRunning | TriggerOutcome::Skipped => None,
    };

    SyncResultItem {
        status,
        message: outcome.user_message(),
        cycle,
    }
}
