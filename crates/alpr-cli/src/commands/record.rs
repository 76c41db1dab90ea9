use std::path::Path;

use alpr_core::{GeoPoint, SyncSettings, ViolationPayload};

use crate::cli::RecordArgs;
use crate::commands::common::{open_store, parse_time_bound, violation_to_item};
use crate::error::CliError;

pub async fn run_record(
    args: RecordArgs,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let payload = build_payload(args.clone(), settings)?;

    let store = open_store(db_path)?;
    let id = store.insert(payload).await?;

    if args.json {
        let violation = store.get(id).await?.ok_or(CliError::NotFound(id))?;
        println!(
            "{}",
            serde_json::to_string_pretty(&violation_to_item(&violation))?
        );
    } else {
        println!("{id}");
    }
    Ok(())
}

/// Assemble a payload from flags, falling back to configured identity.
pub fn build_payload(
    args: RecordArgs,
    settings: &SyncSettings,
) -> Result<ViolationPayload, CliError> {
    let device_id = settings
        .device_id
        .clone()
        .ok_or(CliError::DeviceNotConfigured)?;
    let officer = alpr_core::util::normalize_text_option(args.officer)
        .or_else(|| settings.officer_name.clone())
        .ok_or(CliError::OfficerNotConfigured)?;

    let mut payload = ViolationPayload::new(
        args.plate,
        args.violation_type,
        args.confidence,
        officer,
        device_id,
    );
    if let Some(raw) = args.captured_at.as_deref() {
        payload = payload.with_captured_at(parse_time_bound(raw, false)?);
    }
    if let (Some(latitude), Some(longitude)) = (args.latitude, args.longitude) {
        payload = payload.with_location(GeoPoint::new(latitude, longitude)?);
    }
    if let Some(image) = args.image {
        payload = payload.with_image_path(image);
    }
    Ok(payload)
}
