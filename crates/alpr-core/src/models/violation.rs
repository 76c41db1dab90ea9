//! Violation model

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Local identifier of a captured violation (`SQLite` rowid, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViolationId(i64);

impl ViolationId {
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ViolationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ViolationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Geographic position reported by the location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Combine the optional pair columns into a point.
    ///
    /// Both halves must be present; a half-written pair is treated as absent.
    pub const fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// Business fields the remote authority needs for one captured violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationPayload {
    /// Recognized plate text
    pub plate_number: String,
    /// Violation category (e.g. `parking`, `no_sticker`)
    pub violation_type: String,
    /// When the capture happened; this is the record's creation time
    pub captured_at: DateTime<Utc>,
    /// Recognition confidence in [0, 1]
    pub confidence: f64,
    /// Optional capture location
    pub location: Option<GeoPoint>,
    /// Reference to the captured image
    pub image_path: Option<String>,
    /// Submitting officer
    pub officer_name: String,
    /// Capturing device
    pub device_id: String,
}

impl ViolationPayload {
    /// Build a payload captured now.
    pub fn new(
        plate_number: impl Into<String>,
        violation_type: impl Into<String>,
        confidence: f64,
        officer_name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            plate_number: plate_number.into(),
            violation_type: violation_type.into(),
            captured_at: Utc::now(),
            confidence,
            location: None,
            image_path: None,
            officer_name: officer_name.into(),
            device_id: device_id.into(),
        }
    }

    #[must_use]
    pub const fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    #[must_use]
    pub const fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_image_path(mut self, image_path: impl Into<String>) -> Self {
        self.image_path = Some(image_path.into());
        self
    }

    /// Normalize and check the payload before it is persisted.
    pub fn validate(mut self) -> Result<Self> {
        self.plate_number = normalize_plate(&self.plate_number);
        if self.plate_number.is_empty() {
            return Err(Error::InvalidInput("plate number must not be empty".into()));
        }

        self.violation_type = self.violation_type.trim().to_string();
        if self.violation_type.is_empty() {
            return Err(Error::InvalidInput(
                "violation type must not be empty".into(),
            ));
        }

        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidInput(format!(
                "confidence {} is outside [0, 1]",
                self.confidence
            )));
        }

        if let Some(point) = self.location {
            GeoPoint::new(point.latitude, point.longitude)?;
        }

        self.image_path = crate::util::normalize_text_option(self.image_path);
        self.officer_name = self.officer_name.trim().to_string();
        self.device_id = self.device_id.trim().to_string();
        Ok(self)
    }
}

/// Normalize plate text: trim, collapse inner whitespace, uppercase.
///
/// # Examples
///
/// ```
/// use alpr_core::models::normalize_plate;
///
/// assert_eq!(normalize_plate("  abc   1234 "), "ABC 1234");
/// ```
#[must_use]
pub fn normalize_plate(raw: &str) -> String {
    let re = Regex::new(r"\s+").expect("Invalid regex");
    re.replace_all(raw.trim(), " ").to_uppercase()
}

/// Delivery state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Waiting for delivery
    Pending,
    /// Acknowledged by the remote authority
    Synced,
    /// Terminal failure; no further automatic retry
    Failed,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Decode(format!("unknown sync state '{other}'"))),
        }
    }
}

/// What the remote authority returned when it accepted a violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReceipt {
    /// Canonical remote identifier
    pub remote_id: String,
    /// Fine assigned by the authority
    pub fine_amount: Option<i64>,
    /// Remote processing status
    pub status: Option<String>,
    /// Remote acceptance timestamp
    pub accepted_at: Option<DateTime<Utc>>,
}

impl RemoteReceipt {
    pub fn new(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            fine_amount: None,
            status: None,
            accepted_at: None,
        }
    }
}

/// A captured violation as held in the local outbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: ViolationId,
    pub payload: ViolationPayload,
    pub state: SyncState,
    /// Present iff `state == Synced`
    pub remote: Option<RemoteReceipt>,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Violation {
    pub fn remote_id(&self) -> Option<&str> {
        self.remote.as_ref().map(|receipt| receipt.remote_id.as_str())
    }

    pub fn is_pending(&self) -> bool {
        self.state == SyncState::Pending
    }
}
