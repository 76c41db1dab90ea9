use std::path::Path;

use alpr_core::search::ViolationQuery;

use crate::cli::SearchArgs;
use crate::commands::common::{open_store, parse_time_bound, print_violations};
use crate::error::CliError;

pub async fn run_search(args: &SearchArgs, db_path: &Path) -> Result<(), CliError> {
    let query = build_query(args)?;
    let store = open_store(db_path)?;
    let violations = store.search(&query).await?;
    print_violations(&violations, args.json)
}

pub fn build_query(args: &SearchArgs) -> Result<ViolationQuery, CliError> {
    let from = args
        .from
        .as_deref()
        .map(|raw| parse_time_bound(raw, false))
        .transpose()?;
    let to = args
        .to
        .as_deref()
        .map(|raw| parse_time_bound(raw, true))
        .transpose()?;

    let mut query = ViolationQuery::default()
        .between(from, to)
        .limit(args.limit);
    if let Some(plate) = &args.plate {
        query = query.plate(plate);
    }
    if let Some(violation_type) = &args.violation_type {
        query = query.violation_type(violation_type.clone());
    }
    if let Some(state) = args.state {
        query = query.state(state.into());
    }
    Ok(query)
}
