use std::env;
use std::path::Path;

use alpr_core::config::{ENV_API_TOKEN, ENV_API_URL, ENV_DEVICE_ID, ENV_OFFICER};
use alpr_core::util::normalize_text_option;
use alpr_core::SyncSettings;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config_file::{load_settings, CliConfig};
use crate::error::CliError;

/// Values passed to `alpr config init`.
#[derive(Debug, Clone, Default)]
pub struct ConfigInitArgs {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub device_id: Option<String>,
    pub officer: Option<String>,
    pub sync_interval_secs: Option<u64>,
    pub retention_days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ConfigView {
    path: String,
    api_base_url: Option<String>,
    api_token: Option<&'static str>,
    device_id: Option<String>,
    officer_name: Option<String>,
    sync_interval_secs: u64,
    retention_days: u32,
    pacing_ms: u64,
    request_timeout_secs: u64,
    terminal_on_reject: bool,
    max_unreachable_attempts: Option<u32>,
}

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_url,
            api_token,
            device_id,
            officer,
            sync_interval_secs,
            retention_days,
        } => {
            let args = ConfigInitArgs {
                api_url,
                api_token,
                device_id,
                officer,
                sync_interval_secs,
                retention_days,
            };
            let settings = run_config_init(args, config_path)?;
            report_missing(&settings);
            Ok(())
        }
        ConfigCommands::Show { json } => run_config_show(json, config_path),
    }
}

/// Merge flags, environment and the existing file, then persist.
///
/// Precedence: explicit flag, environment, existing value. A device id is
/// generated when none is available.
pub fn run_config_init(args: ConfigInitArgs, config_path: &Path) -> Result<SyncSettings, CliError> {
    let mut config = CliConfig::load_from_path(config_path)?;
    let existing = config.sync.clone();

    let mut settings = SyncSettings {
        api_base_url: merge_value(args.api_url, ENV_API_URL, existing.api_base_url),
        api_token: merge_value(args.api_token, ENV_API_TOKEN, existing.api_token),
        device_id: merge_value(args.device_id, ENV_DEVICE_ID, existing.device_id)
            .or_else(|| Some(generate_device_id())),
        officer_name: merge_value(args.officer, ENV_OFFICER, existing.officer_name),
        sync_interval_secs: args
            .sync_interval_secs
            .unwrap_or(existing.sync_interval_secs),
        retention_days: args.retention_days.unwrap_or(existing.retention_days),
        ..existing
    };
    settings.normalize();
    settings.validate()?;

    config.version = 1;
    config.sync = settings.clone();
    config.save_to_path(config_path)?;
    println!("Config written to {}", config_path.display());
    Ok(settings)
}

fn run_config_show(as_json: bool, config_path: &Path) -> Result<(), CliError> {
    let settings = load_settings(config_path)?;
    let view = ConfigView {
        path: config_path.display().to_string(),
        api_base_url: settings.api_base_url.clone(),
        api_token: settings.api_token.as_ref().map(|_| "[REDACTED]"),
        device_id: settings.device_id.clone(),
        officer_name: settings.officer_name.clone(),
        sync_interval_secs: settings.sync_interval_secs,
        retention_days: settings.retention_days,
        pacing_ms: settings.pacing_ms,
        request_timeout_secs: settings.request_timeout_secs,
        terminal_on_reject: settings.terminal_on_reject,
        max_unreachable_attempts: settings.max_unreachable_attempts,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("config:        {}", view.path);
    println!(
        "api url:       {}",
        view.api_base_url.as_deref().unwrap_or("(not set)")
    );
    println!("api token:     {}", view.api_token.unwrap_or("(not set)"));
    println!(
        "device id:     {}",
        view.device_id.as_deref().unwrap_or("(not set)")
    );
    println!(
        "officer:       {}",
        view.officer_name.as_deref().unwrap_or("(not set)")
    );
    println!("interval:      {}s", view.sync_interval_secs);
    println!("retention:     {} days", view.retention_days);
    Ok(())
}

fn merge_value(explicit: Option<String>, env_key: &str, existing: Option<String>) -> Option<String> {
    normalize_text_option(explicit)
        .or_else(|| normalize_text_option(env::var(env_key).ok()))
        .or_else(|| normalize_text_option(existing))
}

pub fn generate_device_id() -> String {
    format!("alpr-{}", uuid::Uuid::now_v7())
}

fn report_missing(settings: &SyncSettings) {
    let mut missing_fields = Vec::new();
    if settings.api_base_url.is_none() {
        missing_fields.push("api_url");
    }
    if settings.officer_name.is_none() {
        missing_fields.push("officer");
    }

    if missing_fields.is_empty() {
        println!("Ready. Record with `alpr record <PLATE> --type <TYPE>`.");
    } else {
        println!("Config is missing: {}", missing_fields.join(", "));
    }
}
