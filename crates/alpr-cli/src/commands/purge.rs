use std::path::Path;

use alpr_core::sync::retention_cutoff;
use alpr_core::SyncSettings;
use chrono::Utc;

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_purge(
    older_than_days: Option<u32>,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let days = older_than_days.unwrap_or(settings.retention_days);
    if days == 0 {
        return Err(CliError::Config(
            "retention must be at least one day".to_string(),
        ));
    }

    let cutoff = retention_cutoff(Utc::now(), chrono::Duration::days(i64::from(days)))?;
    let store = open_store(db_path)?;
    let purged = store.purge_synced_older_than(cutoff).await?;
    println!("Purged {purged} synced violations older than {days} days");
    Ok(())
}
