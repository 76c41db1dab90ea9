use std::path::Path;

use crate::commands::common::{open_store, parse_violation_id};
use crate::error::CliError;

pub async fn run_retry(id: Option<&str>, all: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;

    if all {
        let requeued = store.requeue_all_failed().await?;
        println!("Requeued {requeued} failed violations");
        return Ok(());
    }

    let Some(raw_id) = id else {
        return Err(CliError::RetryTargetMissing);
    };
    let id = parse_violation_id(raw_id)?;
    if store.requeue_failed(id).await? {
        println!("{id}");
        Ok(())
    } else if store.get(id).await?.is_some() {
        println!("Violation {id} is not in the failed state");
        Ok(())
    } else {
        Err(CliError::NotFound(id))
    }
}
