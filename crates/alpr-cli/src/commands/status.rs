use std::path::Path;

use serde::Serialize;

use crate::commands::common::{cycle_to_item, format_cycle_line, open_store, CycleItem};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusItem {
    pending: u64,
    synced: u64,
    failed: u64,
    last_cycle: Option<CycleItem>,
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let stats = store.stats().await?;
    let last_cycle = store.last_cycle().await?;

    if as_json {
        let item = StatusItem {
            pending: stats.pending,
            synced: stats.synced,
            failed: stats.failed,
            last_cycle: last_cycle.as_ref().map(cycle_to_item),
        };
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("Pending: {}", stats.pending);
    println!("Synced:  {}", stats.synced);
    println!("Failed:  {}", stats.failed);
    match last_cycle {
        Some(report) => println!("Last sync: {}", format_cycle_line(&report)),
        None => println!("Last sync: never"),
    }
    Ok(())
}
