use std::path::Path;

use alpr_core::search::ViolationQuery;

use crate::cli::StateFilter;
use crate::commands::common::{open_store, print_violations};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    offset: usize,
    state: Option<StateFilter>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let violations = if let Some(state) = state {
        let query = ViolationQuery::default()
            .state(state.into())
            .limit(limit)
            .offset(offset);
        store.search(&query).await?
    } else {
        store.list_all(limit, offset).await?
    };

    print_violations(&violations, as_json)
}
