use std::path::Path;

use crate::commands::common::{
    format_violation_detail, open_store, parse_violation_id, violation_to_item,
};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let id = parse_violation_id(id)?;
    let store = open_store(db_path)?;
    let violation = store.get(id).await?.ok_or(CliError::NotFound(id))?;

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&violation_to_item(&violation))?
        );
    } else {
        for line in format_violation_detail(&violation) {
            println!("{line}");
        }
    }
    Ok(())
}
