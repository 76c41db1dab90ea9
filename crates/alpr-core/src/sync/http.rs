//! HTTP transport to the remote violation authority

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::client::{SubmitOutcome, SyncClient};
use crate::error::{Error, Result};
use crate::models::{RemoteReceipt, ViolationPayload};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const SUBMIT_PATH: &str = "/api/violations";
const HEALTH_PATH: &str = "/api/health";
const USER_AGENT: &str = concat!("alpr-outbox/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`HttpSyncClient`].
#[derive(Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    /// Applied to both connect and whole-request time
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpClientConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Answer of the authority's health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Clone)]
pub struct HttpSyncClient {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl HttpSyncClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let base_url = normalize_base_url(config.base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            base_url,
            api_token: normalize_text_option(config.api_token),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the authority. Used as the connectivity precondition for
    /// scheduled cycles.
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self
            .client
            .get(format!("{}{HEALTH_PATH}", self.base_url))
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<HealthStatus>().await?)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn submit(&self, payload: &ViolationPayload) -> SubmitOutcome {
        let request = self
            .authorize(self.client.post(format!("{}{SUBMIT_PATH}", self.base_url)))
            .header("Accept", "application/json")
            .json(&SubmitRequest::from(payload));

        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                return SubmitOutcome::Unreachable {
                    cause: describe_transport_error(&error),
                };
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => classify_response(status, &body),
            Err(error) => SubmitOutcome::Unreachable {
                cause: describe_transport_error(&error),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    plate_number: &'a str,
    violation_type: &'a str,
    timestamp: String,
    confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<WireLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    officer_name: &'a str,
    device_id: &'a str,
}

#[derive(Debug, Serialize)]
struct WireLocation {
    latitude: f64,
    longitude: f64,
}

impl<'a> From<&'a ViolationPayload> for SubmitRequest<'a> {
    fn from(payload: &'a ViolationPayload) -> Self {
        Self {
            plate_number: &payload.plate_number,
            violation_type: &payload.violation_type,
            timestamp: payload
                .captured_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            confidence_score: payload.confidence,
            location: payload.location.map(|point| WireLocation {
                latitude: point.latitude,
                longitude: point.longitude,
            }),
            image_url: payload.image_path.as_deref(),
            officer_name: &payload.officer_name,
            device_id: &payload.device_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    violation_id: Option<String>,
    fine_amount: Option<serde_json::Number>,
    status: Option<String>,
    timestamp: Option<String>,
    error: Option<String>,
    message: Option<String>,
    message_en: Option<String>,
}

impl SubmitResponse {
    fn failure_reason(self) -> Option<String> {
        self.error
            .or(self.message_en)
            .or(self.message)
            .and_then(|reason| normalize_text_option(Some(reason)))
    }
}

/// Map an HTTP answer onto the submit contract.
fn classify_response(status: StatusCode, body: &str) -> SubmitOutcome {
    if status.is_success() {
        return match serde_json::from_str::<SubmitResponse>(body) {
            Ok(response) if response.success => accepted_receipt(response).map_or_else(
                || SubmitOutcome::Rejected {
                    reason: format!(
                        "success response did not include violation_id ({})",
                        status.as_u16()
                    ),
                },
                SubmitOutcome::Accepted,
            ),
            Ok(response) => SubmitOutcome::Rejected {
                reason: response.failure_reason().map_or_else(
                    || format!("authority reported failure ({})", status.as_u16()),
                    |reason| format!("{reason} ({})", status.as_u16()),
                ),
            },
            Err(error) => SubmitOutcome::Unreachable {
                cause: format!("unreadable response ({}): {error}", status.as_u16()),
            },
        };
    }

    let message = parse_api_error(status, body);
    if is_permanent_rejection(status) {
        SubmitOutcome::Rejected { reason: message }
    } else {
        SubmitOutcome::Unreachable { cause: message }
    }
}

fn accepted_receipt(response: SubmitResponse) -> Option<RemoteReceipt> {
    let remote_id = normalize_text_option(response.violation_id)?;
    Some(RemoteReceipt {
        remote_id,
        fine_amount: response.fine_amount.and_then(|amount| amount.as_i64()),
        status: normalize_text_option(response.status),
        accepted_at: response
            .timestamp
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|timestamp| timestamp.with_timezone(&Utc)),
    })
}

/// Client errors that resubmitting the same payload cannot fix.
///
/// Auth failures and throttling are treated as transient: they are fixed
/// by configuration or time, not by changing the record.
fn is_permanent_rejection(status: StatusCode) -> bool {
    status.is_client_error()
        && !matches!(
            status,
            StatusCode::UNAUTHORIZED
                | StatusCode::FORBIDDEN
                | StatusCode::REQUEST_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS
        )
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "could not connect to the authority".to_string()
    } else {
        compact_text(&error.to_string())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("api base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "api base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured {
        body: Arc<Mutex<Option<Value>>>,
        authorization: Arc<Mutex<Option<String>>>,
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }

    fn client(base_url: String, timeout: Duration) -> HttpSyncClient {
        HttpSyncClient::new(HttpClientConfig {
            base_url,
            api_token: Some("test-token".into()),
            timeout,
        })
        .unwrap()
    }

    fn payload() -> ViolationPayload {
        ViolationPayload::new("ABC 123", "speeding", 0.87, "Officer Salem", "device-7")
            .with_captured_at(DateTime::from_timestamp_millis(1_700_000_000_123).unwrap())
            .with_location(GeoPoint::new(24.7136, 46.6753).unwrap())
    }

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" https://api.example.com/ ".to_string()).unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = HttpClientConfig {
            base_url: "https://api.example.com".into(),
            api_token: Some("secret".into()),
            timeout: Duration::from_secs(1),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn classify_success_requires_violation_id() {
        let accepted = classify_response(
            StatusCode::OK,
            r#"{"success":true,"violation_id":"V-2024-1","fine_amount":500,"status":"pending","timestamp":"2024-03-01T10:00:00.000Z"}"#,
        );
        let SubmitOutcome::Accepted(receipt) = accepted else {
            panic!("expected acceptance, got {accepted:?}");
        };
        assert_eq!(receipt.remote_id, "V-2024-1");
        assert_eq!(receipt.fine_amount, Some(500));
        assert_eq!(receipt.status.as_deref(), Some("pending"));
        assert!(receipt.accepted_at.is_some());

        assert!(matches!(
            classify_response(StatusCode::OK, r#"{"success":true,"violation_id":"  "}"#),
            SubmitOutcome::Rejected { .. }
        ));
        assert!(matches!(
            classify_response(StatusCode::OK, r#"{"success":false,"error":"duplicate"}"#),
            SubmitOutcome::Rejected { reason } if reason == "duplicate (200)"
        ));
    }

    #[test]
    fn classify_unreadable_success_body_as_unreachable() {
        assert!(matches!(
            classify_response(StatusCode::OK, "<html>proxy</html>"),
            SubmitOutcome::Unreachable { .. }
        ));
    }

    #[test]
    fn classify_status_codes() {
        let rejected = classify_response(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"error":"Missing required fields"}"#,
        );
        assert_eq!(
            rejected,
            SubmitOutcome::Rejected {
                reason: "Missing required fields (400)".into()
            }
        );

        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
        ] {
            assert!(
                matches!(classify_response(status, ""), SubmitOutcome::Unreachable { .. }),
                "{status} should be transient"
            );
        }

        assert!(matches!(
            classify_response(StatusCode::UNPROCESSABLE_ENTITY, ""),
            SubmitOutcome::Rejected { reason } if reason == "HTTP 422"
        ));
    }

    #[test]
    fn wire_body_uses_authority_field_names() {
        let value = serde_json::to_value(SubmitRequest::from(&payload())).unwrap();
        assert_eq!(
            value,
            json!({
                "plate_number": "ABC 123",
                "violation_type": "speeding",
                "timestamp": "2023-11-14T22:13:20.123Z",
                "confidence_score": 0.87,
                "location": { "latitude": 24.7136, "longitude": 46.6753 },
                "officer_name": "Officer Salem",
                "device_id": "device-7",
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_posts_payload_with_bearer_token() {
        async fn accept(
            State(captured): State<Captured>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            *captured.authorization.lock().unwrap() = headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string);
            *captured.body.lock().unwrap() = Some(body);
            Json(json!({
                "success": true,
                "violation_id": "V-2024-42",
                "fine_amount": 500,
                "status": "pending",
                "timestamp": "2024-03-01T10:00:00.000Z",
            }))
        }

        let captured = Captured::default();
        let router = Router::new()
            .route(SUBMIT_PATH, post(accept))
            .with_state(captured.clone());
        let base_url = spawn_server(router).await;

        let outcome = client(base_url, Duration::from_secs(5))
            .submit(&payload())
            .await;

        let SubmitOutcome::Accepted(receipt) = outcome else {
            panic!("expected acceptance, got {outcome:?}");
        };
        assert_eq!(receipt.remote_id, "V-2024-42");
        assert_eq!(
            captured.authorization.lock().unwrap().as_deref(),
            Some("Bearer test-token")
        );
        let body = captured.body.lock().unwrap().clone().unwrap();
        assert_eq!(body["plate_number"], "ABC 123");
        assert_eq!(body["device_id"], "device-7");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_maps_bad_request_to_rejected() {
        let router = Router::new().route(
            SUBMIT_PATH,
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"success": false, "error": "Missing required fields"})),
                )
            }),
        );
        let base_url = spawn_server(router).await;

        let outcome = client(base_url, Duration::from_secs(5))
            .submit(&payload())
            .await;
        assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_maps_server_error_to_unreachable() {
        let router = Router::new().route(
            SUBMIT_PATH,
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"success": false, "error": "Internal server error"})),
                )
            }),
        );
        let base_url = spawn_server(router).await;

        let outcome = client(base_url, Duration::from_secs(5))
            .submit(&payload())
            .await;
        assert_eq!(
            outcome,
            SubmitOutcome::Unreachable {
                cause: "Internal server error (500)".into()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_times_out_as_unreachable() {
        let router = Router::new().route(
            SUBMIT_PATH,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"success": true, "violation_id": "late"}))
            }),
        );
        let base_url = spawn_server(router).await;

        let outcome = client(base_url, Duration::from_millis(200))
            .submit(&payload())
            .await;
        assert!(matches!(outcome, SubmitOutcome::Unreachable { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_without_listener_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let outcome = client(format!("http://{address}"), Duration::from_secs(2))
            .submit(&payload())
            .await;
        assert!(matches!(outcome, SubmitOutcome::Unreachable { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn health_reads_status() {
        let router = Router::new().route(
            HEALTH_PATH,
            get(|| async {
                Json(json!({"success": true, "status": "ok", "version": "1.5.1"}))
            }),
        );
        let base_url = spawn_server(router).await;

        let health = client(base_url, Duration::from_secs(5)).health().await.unwrap();
        assert_eq!(health.status.as_deref(), Some("ok"));
        assert_eq!(health.version.as_deref(), Some("1.5.1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn health_fails_on_error_status() {
        let router = Router::new().route(
            HEALTH_PATH,
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base_url = spawn_server(router).await;

        let error = client(base_url, Duration::from_secs(5))
            .health()
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Http(_)));
    }
}
