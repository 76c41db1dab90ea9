//! alpr - capture traffic violations offline and deliver them later
//!
//! Records land in a local outbox first; `alpr sync` and `alpr daemon`
//! drain it to the remote authority.

mod cli;
mod commands;
mod config_file;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::config_file::{load_settings, resolve_config_path};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "alpr=info"
                    .parse()
                    .map_err(|error| CliError::Config(format!("log filter: {error}")))?,
            ),
        )
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref())?;
    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Record(args) => {
            let settings = load_settings(&config_path)?;
            commands::record::run_record(args, &settings, &db_path).await?;
        }
        Commands::List {
            limit,
            offset,
            state,
            json,
        } => commands::list::run_list(limit, offset, state, json, &db_path).await?,
        Commands::Search(args) => commands::search::run_search(&args, &db_path).await?,
        Commands::Show { id, json } => commands::show::run_show(&id, json, &db_path).await?,
        Commands::Status { json } => commands::status::run_status(json, &db_path).await?,
        Commands::Sync { json } => {
            let settings = load_settings(&config_path)?;
            commands::sync::run_sync(json, &settings, &db_path).await?;
        }
        Commands::Failed { json } => commands::failed::run_failed(json, &db_path).await?,
        Commands::Retry { id, all } => {
            commands::retry::run_retry(id.as_deref(), all, &db_path).await?;
        }
        Commands::Purge { older_than_days } => {
            let settings = load_settings(&config_path)?;
            commands::purge::run_purge(older_than_days, &settings, &db_path).await?;
        }
        Commands::Daemon { interval_secs } => {
            let settings = load_settings(&config_path)?;
            commands::daemon::run_daemon(interval_secs, &settings, &db_path).await?;
        }
        Commands::Config { command } => commands::config::run_config(command, &config_path)?,
    }

    Ok(())
}
