use std::path::Path;

use crate::commands::common::{format_violation_lines, open_store, print_violations};
use crate::error::CliError;

pub async fn run_failed(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let failed = store.list_failed().await?;

    if as_json {
        return print_violations(&failed, true);
    }
    if failed.is_empty() {
        println!("No failed violations.");
        return Ok(());
    }

    for (line, violation) in format_violation_lines(&failed).into_iter().zip(&failed) {
        println!("{line}");
        if let Some(error) = &violation.last_error {
            println!("        {error}");
        }
    }
    println!("Run `alpr retry --all` to requeue them.");
    Ok(())
}
