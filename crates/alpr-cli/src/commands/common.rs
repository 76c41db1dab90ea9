use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alpr_core::models::CycleReport;
use alpr_core::sync::HttpSyncClient;
use alpr_core::{
    OutboxStore, SyncCoordinator, SyncEngine, SyncSettings, SyncState, Violation, ViolationId,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use single_instance::SingleInstance;
use uuid::Uuid;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ViolationItem {
    pub id: i64,
    pub plate_number: String,
    pub violation_type: String,
    pub captured_at: String,
    pub relative_time: String,
    pub confidence: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_path: Option<String>,
    pub officer_name: String,
    pub device_id: String,
    pub state: String,
    pub remote_id: Option<String>,
    pub fine_amount: Option<i64>,
    pub remote_status: Option<String>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CycleItem {
    pub origin: String,
    pub started_at: String,
    pub finished_at: String,
    pub succeeded: bool,
    pub synced: u32,
    pub failed: u32,
    pub rejected: u32,
    pub inconsistent: u32,
    pub purged: u32,
    pub message: String,
    pub error: Option<String>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("ALPR_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("alpr").join("outbox.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

pub fn open_store(db_path: &Path) -> Result<OutboxStore, CliError> {
    Ok(OutboxStore::open_path(db_path)?)
}

/// Coordinator wired to the configured authority.
pub fn build_coordinator(
    store: OutboxStore,
    settings: &SyncSettings,
) -> Result<(SyncCoordinator, Arc<HttpSyncClient>), CliError> {
    let client = Arc::new(HttpSyncClient::new(settings.client_config()?)?);
    let engine = SyncEngine::new(store, client.clone(), settings.policy());
    Ok((SyncCoordinator::new(engine), client))
}

/// Cross-process lock held for the duration of one cycle against `db_path`.
///
/// Returns `None` when another process holds it.
pub fn acquire_cycle_lock(db_path: &Path) -> Result<Option<SingleInstance>, CliError> {
    let name = cycle_lock_name(db_path)?;
    let instance =
        SingleInstance::new(&name).map_err(|error| CliError::InstanceLock(error.to_string()))?;
    Ok(instance.is_single().then_some(instance))
}

/// Lock name shared by every spelling of the same database file.
pub fn cycle_lock_name(db_path: &Path) -> Result<String, CliError> {
    let canonical = canonical_db_path(db_path)?;
    let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, canonical.to_string_lossy().as_bytes());
    Ok(format!("alpr-outbox-cycle-{}", id.simple()))
}

fn canonical_db_path(db_path: &Path) -> Result<PathBuf, CliError> {
    if let Ok(path) = db_path.canonicalize() {
        return Ok(path);
    }

    let file_name = db_path.file_name().ok_or_else(|| {
        CliError::Config(format!("Invalid database path {}", db_path.display()))
    })?;
    let parent = match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    Ok(parent.canonicalize()?.join(file_name))
}

pub fn parse_violation_id(raw: &str) -> Result<ViolationId, CliError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<ViolationId>()
        .ok()
        .filter(|id| id.get() > 0)
        .ok_or_else(|| CliError::InvalidId(trimmed.to_string()))
}

/// Parse a `YYYY-MM-DD` or RFC 3339 time.
///
/// A bare date resolves to the start of that day, or to the start of the
/// next day when `end_of_day` is set.
pub fn parse_time_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, CliError> {
    let trimmed = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| CliError::InvalidTime(trimmed.to_string()))?;
    let date = if end_of_day {
        date.checked_add_days(Days::new(1))
            .ok_or_else(|| CliError::InvalidTime(trimmed.to_string()))?
    } else {
        date
    };
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CliError::InvalidTime(trimmed.to_string()))
}

pub fn format_violation_lines(violations: &[Violation]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    violations
        .iter()
        .map(|violation| {
            let relative_time =
                format_relative_time(violation.payload.captured_at.timestamp_millis(), now_ms);
            let state = state_label(violation);
            format!(
                "{:>6}  {:<12}  {:<14}  {:<10}  {state}",
                violation.id,
                truncate(&violation.payload.plate_number, 12),
                truncate(&violation.payload.violation_type, 14),
                relative_time
            )
        })
        .collect()
}

pub fn format_violation_detail(violation: &Violation) -> Vec<String> {
    let payload = &violation.payload;
    let mut lines = vec![
        format!("id:          {}", violation.id),
        format!("plate:       {}", payload.plate_number),
        format!("type:        {}", payload.violation_type),
        format!("captured:    {}", format_timestamp(payload.captured_at)),
        format!("confidence:  {:.2}", payload.confidence),
        format!("officer:     {}", payload.officer_name),
        format!("device:      {}", payload.device_id),
    ];
    if let Some(location) = payload.location {
        lines.push(format!(
            "location:    {:.6}, {:.6}",
            location.latitude, location.longitude
        ));
    }
    if let Some(image) = &payload.image_path {
        lines.push(format!("image:       {image}"));
    }
    lines.push(format!("state:       {}", violation.state));
    if let Some(receipt) = &violation.remote {
        lines.push(format!("remote id:   {}", receipt.remote_id));
        if let Some(fine) = receipt.fine_amount {
            lines.push(format!("fine:        {fine}"));
        }
        if let Some(status) = &receipt.status {
            lines.push(format!("status:      {status}"));
        }
    }
    lines.push(format!("attempts:    {}", violation.attempt_count));
    if let Some(last_attempt) = violation.last_attempt_at {
        lines.push(format!("last try:    {}", format_timestamp(last_attempt)));
    }
    if let Some(error) = &violation.last_error {
        lines.push(format!("last error:  {error}"));
    }
    lines
}

pub fn violation_to_item(violation: &Violation) -> ViolationItem {
    let now_ms = Utc::now().timestamp_millis();
    let payload = &violation.payload;

    ViolationItem {
        id: violation.id.get(),
        plate_number: payload.plate_number.clone(),
        violation_type: payload.violation_type.clone(),
        captured_at: payload.captured_at.to_rfc3339(),
        relative_time: format_relative_time(payload.captured_at.timestamp_millis(), now_ms),
        confidence: payload.confidence,
        latitude: payload.location.map(|location| location.latitude),
        longitude: payload.location.map(|location| location.longitude),
        image_path: payload.image_path.clone(),
        officer_name: payload.officer_name.clone(),
        device_id: payload.device_id.clone(),
        state: violation.state.to_string(),
        remote_id: violation.remote_id().map(ToString::to_string),
        fine_amount: violation
            .remote
            .as_ref()
            .and_then(|receipt| receipt.fine_amount),
        remote_status: violation
            .remote
            .as_ref()
            .and_then(|receipt| receipt.status.clone()),
        attempts: violation.attempt_count,
        last_error: violation.last_error.clone(),
    }
}

pub fn cycle_to_item(report: &CycleReport) -> CycleItem {
    let summary = report.summary().copied().unwrap_or_default();
    CycleItem {
        origin: report.origin.to_string(),
        started_at: report.started_at.to_rfc3339(),
        finished_at: report.finished_at.to_rfc3339(),
        succeeded: report.outcome.is_ok(),
        synced: summary.synced,
        failed: summary.failed,
        rejected: summary.rejected,
        inconsistent: summary.inconsistent,
        purged: summary.purged,
        message: report.user_message(),
        error: report.outcome.as_ref().err().cloned(),
    }
}

pub fn format_cycle_line(report: &CycleReport) -> String {
    format!(
        "{} ({}): {}",
        format_timestamp(report.finished_at),
        report.origin,
        report.user_message()
    )
}

fn state_label(violation: &Violation) -> String {
    match violation.state {
        SyncState::Synced => violation
            .remote_id()
            .map_or_else(|| "synced".to_string(), |id| format!("synced {id}")),
        SyncState::Pending if violation.attempt_count > 0 => {
            format!("pending ({} tries)", violation.attempt_count)
        }
        state => state.to_string(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = value.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn print_violations(violations: &[Violation], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let items = violations
            .iter()
            .map(violation_to_item)
            .collect::<Vec<ViolationItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if violations.is_empty() {
        println!("No violations found.");
        return Ok(());
    }

    for line in format_violation_lines(violations) {
        println!("{line}");
    }
    Ok(())
}
