//! Sync configuration shared by the CLI and any other host.
//!
//! `SyncSettings` is what gets persisted in the client config file. Hosts
//! overlay environment variables on top of it, then derive the HTTP client
//! configuration and the engine policy from the merged value.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::{HttpClientConfig, SyncPolicy};
use crate::util::{is_http_url, normalize_text_option};

/// Interval between scheduled cycles
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15 * 60;
/// Age after which synced violations are reclaimed
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
/// Longest accepted retention window (100 years)
pub const MAX_RETENTION_DAYS: u32 = 36_500;
/// Delay between two submissions inside a cycle
pub const DEFAULT_PACING_MS: u64 = 100;
/// Per-request timeout for the remote authority
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "ALPR_API_URL";
pub const ENV_API_TOKEN: &str = "ALPR_API_TOKEN";
pub const ENV_DEVICE_ID: &str = "ALPR_DEVICE_ID";
pub const ENV_OFFICER: &str = "ALPR_OFFICER";
pub const ENV_SYNC_INTERVAL_SECS: &str = "ALPR_SYNC_INTERVAL_SECS";
pub const ENV_RETENTION_DAYS: &str = "ALPR_RETENTION_DAYS";

/// Persisted client settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    /// Base URL of the remote authority (e.g. `https://api.example.com`)
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Bearer token for the remote authority
    #[serde(default)]
    pub api_token: Option<String>,
    /// Identifier stamped on every captured violation
    #[serde(default)]
    pub device_id: Option<String>,
    /// Default submitting officer
    #[serde(default)]
    pub officer_name: Option<String>,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Park rejected violations as failed instead of retrying them
    #[serde(default = "default_true")]
    pub terminal_on_reject: bool,
    /// Give up on a violation after this many failed attempts
    #[serde(default)]
    pub max_unreachable_attempts: Option<u32>,
}

const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

const fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

const fn default_pacing_ms() -> u64 {
    DEFAULT_PACING_MS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            device_id: None,
            officer_name: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            retention_days: DEFAULT_RETENTION_DAYS,
            pacing_ms: DEFAULT_PACING_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            terminal_on_reject: true,
            max_unreachable_attempts: None,
        }
    }
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("device_id", &self.device_id)
            .field("officer_name", &self.officer_name)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("retention_days", &self.retention_days)
            .field("pacing_ms", &self.pacing_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("terminal_on_reject", &self.terminal_on_reject)
            .field("max_unreachable_attempts", &self.max_unreachable_attempts)
            .finish()
    }
}

impl SyncSettings {
    /// Parse settings from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut settings: Self = serde_json::from_str(raw)?;
        settings.normalize();
        Ok(settings)
    }

    /// Trim text fields and drop empties.
    pub fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(self.api_base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.api_token = normalize_text_option(self.api_token.take());
        self.device_id = normalize_text_option(self.device_id.take());
        self.officer_name = normalize_text_option(self.officer_name.take());
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup (environment-shaped).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = lookup(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(device_id) = lookup(ENV_DEVICE_ID) {
            self.device_id = Some(device_id);
        }
        if let Some(officer) = lookup(ENV_OFFICER) {
            self.officer_name = Some(officer);
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_SYNC_INTERVAL_SECS)) {
            self.sync_interval_secs = parse_env_number(ENV_SYNC_INTERVAL_SECS, &raw)?;
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_RETENTION_DAYS)) {
            self.retention_days = parse_env_number(ENV_RETENTION_DAYS, &raw)?;
        }
        self.normalize();
        Ok(())
    }

    /// Check values that have no sensible fallback.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.api_base_url {
            if !is_http_url(url) {
                return Err(Error::Config(format!(
                    "api_base_url must include http:// or https:// (got '{url}')"
                )));
            }
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::Config("sync_interval_secs must be positive".into()));
        }
        if self.retention_days == 0 {
            return Err(Error::Config("retention_days must be positive".into()));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(Error::Config(format!(
                "retention_days must be at most {MAX_RETENTION_DAYS}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        if self.max_unreachable_attempts == Some(0) {
            return Err(Error::Config(
                "max_unreachable_attempts must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// HTTP client configuration; requires `api_base_url`.
    pub fn client_config(&self) -> Result<HttpClientConfig> {
        self.validate()?;
        let base_url = self.api_base_url.clone().ok_or_else(|| {
            Error::Config(format!(
                "remote authority URL is not configured (set {ENV_API_URL} or run `alpr config init`)"
            ))
        })?;

        Ok(HttpClientConfig {
            base_url,
            api_token: self.api_token.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    /// Engine policy derived from these settings.
    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            pacing: Duration::from_millis(self.pacing_ms),
            retention: chrono::Duration::days(i64::from(self.retention_days)),
            terminal_on_reject: self.terminal_on_reject,
            max_unreachable_attempts: self.max_unreachable_attempts,
        }
    }
}

fn parse_env_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Config(format!("{key} must be a positive integer (got '{raw}')")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_scheduler_contract() {
        let settings = SyncSettings::default();
        assert_eq!(settings.sync_interval(), Duration::from_secs(900));
        assert_eq!(settings.retention_days, 30);
        assert!(settings.terminal_on_reject);
        assert_eq!(settings.max_unreachable_attempts, None);

        let policy = settings.policy();
        assert_eq!(policy, SyncPolicy::default());
    }

    #[test]
    fn from_json_fills_defaults_and_trims() {
        let settings = SyncSettings::from_json(
            r#"{ "api_base_url": " https://api.example.com/ ", "device_id": "  " }"#,
        )
        .unwrap();
        assert_eq!(
            settings.api_base_url.as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(settings.device_id, None);
        assert_eq!(settings.pacing_ms, DEFAULT_PACING_MS);
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        let error = SyncSettings::from_json(r#"{ "api_url": "https://x" }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env = HashMap::from([
            (ENV_API_URL, "http://localhost:3000"),
            (ENV_API_TOKEN, "secret"),
            (ENV_SYNC_INTERVAL_SECS, "60"),
        ]);
        let mut settings = SyncSettings {
            api_base_url: Some("https://old.example.com".into()),
            ..Default::default()
        };

        settings
            .apply_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(settings.api_base_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(settings.api_token.as_deref(), Some("secret"));
        assert_eq!(settings.sync_interval_secs, 60);
    }

    #[test]
    fn env_override_rejects_non_numeric_interval() {
        let mut settings = SyncSettings::default();
        let error = settings
            .apply_overrides(|key| (key == ENV_RETENTION_DAYS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn client_config_requires_http_url() {
        assert!(SyncSettings::default().client_config().is_err());

        let bad = SyncSettings {
            api_base_url: Some("api.example.com".into()),
            ..Default::default()
        };
        assert!(bad.client_config().is_err());

        let good = SyncSettings {
            api_base_url: Some("https://api.example.com".into()),
            request_timeout_secs: 5,
            ..Default::default()
        };
        let config = good.client_config().unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn validate_bounds_retention_window() {
        let too_long = SyncSettings {
            retention_days: 100_000_000,
            ..Default::default()
        };
        assert!(matches!(too_long.validate(), Err(Error::Config(_))));

        let longest = SyncSettings {
            retention_days: MAX_RETENTION_DAYS,
            ..Default::default()
        };
        longest.validate().unwrap();
        crate::sync::retention_cutoff(chrono::Utc::now(), longest.policy().retention).unwrap();
    }

    #[test]
    fn debug_redacts_token() {
        let settings = SyncSettings {
            api_token: Some("secret".into()),
            ..Default::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
