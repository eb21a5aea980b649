//! Cloudflare binding for [`EdgeProvider`]
//!
//! Uses Cloudflare REST API v4.
//!
//! # API Endpoints Used
//!
//! - `POST /zones` - Create a zone in the configured account
//! - `GET /zones?name={domain}` - Look up a zone by name
//! - `GET /zones/{zone_id}` / `DELETE /zones/{zone_id}`
//! - `POST|GET /zones/{zone_id}/dns_records`, `DELETE /zones/{zone_id}/dns_records/{id}`
//! - `PATCH /zones/{zone_id}/ssl/universal/settings` - Enable Universal SSL
//! - `GET /zones/{zone_id}/ssl/certificate_packs` - Read issued edge certificates
//!
//! # Required Permissions
//!
//! The API token needs `Zone:Edit`, `Zone:DNS:Edit` and `Zone:SSL and Certificates:Edit`
//! on the account that owns storefront zones.

use crate::{
    DnsRecord, EdgeProvider, NewDnsRecord, ProviderError, SslActivation, SslState, Zone, ZoneState,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cloudflare API base URL
const CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Default timeout for a single provider request
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size when listing DNS records
const DNS_RECORDS_PAGE_SIZE: u32 = 100;

/// Cloudflare error codes we classify explicitly
const CF_CODE_AUTH_ERROR: i64 = 10000;
const CF_CODE_INVALID_TOKEN: i64 = 9109;
const CF_CODE_ZONE_EXISTS: i64 = 1061;

/// Backoff policy for transient provider failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each retry
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Provider client configuration
#[derive(Clone)]
pub struct ProviderConfig {
    /// API token
    pub api_token: String,
    /// Account that owns storefront zones
    pub account_id: String,
    /// API base URL (overridable for tests and proxies)
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl ProviderConfig {
    pub fn new(api_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            account_id: account_id.into(),
            base_url: CLOUDFLARE_API_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Cloudflare edge provider
#[derive(Debug)]
pub struct CloudflareProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built, the account ID is
    /// empty, or the API token contains invalid header characters.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_token.trim().is_empty() {
            return Err(ProviderError::Config("API token is required".to_string()));
        }
        if config.account_id.trim().is_empty() {
            return Err(ProviderError::Config("account ID is required".to_string()));
        }

        // Fail early if the token cannot be used in headers
        HeaderValue::from_str(&format!("Bearer {}", config.api_token)).map_err(|_| {
            ProviderError::Config("API token contains invalid characters".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a provider against a custom base URL with fast retries
    ///
    /// Used by integration tests against a mock server.
    pub fn new_with_base_url(
        api_token: String,
        account_id: String,
        base_url: String,
    ) -> Result<Self, ProviderError> {
        let config = ProviderConfig::new(api_token, account_id)
            .with_base_url(base_url)
            .with_timeout(Duration::from_secs(5))
            .with_retry(RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
            });
        Self::new(config)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build authorization headers for API requests
    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        // Token was validated in constructor
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.config.api_token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Send a request, retrying transient failures with exponential backoff
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ProviderError> {
        let retry = &self.config.retry;
        let mut attempt = 1;

        loop {
            match self.send_once(method.clone(), path, body).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < retry.max_attempts => {
                    let delay = match &e {
                        ProviderError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => Duration::from_secs(*secs).min(retry.max_delay),
                        _ => retry.delay_for(attempt),
                    };
                    warn!(
                        method = %method,
                        path = %path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(method = %method, url = %url, "Calling provider API");

        let mut request = self
            .client
            .request(method, &url)
            .headers(self.auth_headers());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let bytes = response.bytes().await?;

        decode_envelope(status, retry_after, &bytes)
    }
}

#[async_trait]
impl EdgeProvider for CloudflareProvider {
    async fn create_zone(&self, hostname: &str) -> Result<Zone, ProviderError> {
        info!(hostname = %hostname, "Creating Cloudflare zone");

        let body = json!({
            "name": hostname,
            "account": { "id": self.config.account_id },
            "type": "full",
        });
        let zone: ZoneResponse = self.request(Method::POST, "/zones", Some(&body)).await?;
        let zone = Zone::try_from(zone)?;

        info!(zone_id = %zone.id, hostname = %hostname, "Created Cloudflare zone");
        Ok(zone)
    }

    async fn find_zone(&self, hostname: &str) -> Result<Option<Zone>, ProviderError> {
        debug!(hostname = %hostname, "Looking up Cloudflare zone");

        let path = format!(
            "/zones?name={}&account.id={}",
            hostname, self.config.account_id
        );
        let zones: Vec<ZoneResponse> = self.request(Method::GET, &path, None).await?;

        // Exact match only; the API may return zones with similar names
        zones
            .into_iter()
            .find(|z| z.name.eq_ignore_ascii_case(hostname))
            .map(Zone::try_from)
            .transpose()
    }

    async fn get_zone(&self, zone_id: &str) -> Result<Zone, ProviderError> {
        let zone: ZoneResponse = self
            .request(Method::GET, &format!("/zones/{}", zone_id), None)
            .await?;
        Zone::try_from(zone)
    }

    async fn delete_zone(&self, zone_id: &str) -> Result<(), ProviderError> {
        info!(zone_id = %zone_id, "Deleting Cloudflare zone");

        match self
            .request::<IdResponse>(Method::DELETE, &format!("/zones/{}", zone_id), None)
            .await
        {
            Ok(_) => Ok(()),
            // Already gone upstream
            Err(ProviderError::NotFound(_)) => {
                debug!(zone_id = %zone_id, "Zone already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn create_dns_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, ProviderError> {
        debug!(zone_id = %zone_id, name = %record.name, record_type = %record.record_type, "Creating DNS record");

        let body = serde_json::to_value(CreateDnsRecord {
            record_type: &record.record_type,
            name: &record.name,
            content: &record.content,
            ttl: record.ttl,
            proxied: record.proxied,
        })
        .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let created: DnsRecordResponse = self
            .request(
                Method::POST,
                &format!("/zones/{}/dns_records", zone_id),
                Some(&body),
            )
            .await?;

        Ok(created.into())
    }

    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ProviderError> {
        let records: Vec<DnsRecordResponse> = self
            .request(
                Method::GET,
                &format!(
                    "/zones/{}/dns_records?per_page={}",
                    zone_id, DNS_RECORDS_PAGE_SIZE
                ),
                None,
            )
            .await?;

        Ok(records.into_iter().map(DnsRecord::from).collect())
    }

    async fn delete_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<(), ProviderError> {
        match self
            .request::<IdResponse>(
                Method::DELETE,
                &format!("/zones/{}/dns_records/{}", zone_id, record_id),
                None,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(ProviderError::NotFound(_)) => {
                debug!(record_id = %record_id, "Record already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn activate_ssl(&self, zone_id: &str) -> Result<SslActivation, ProviderError> {
        info!(zone_id = %zone_id, "Enabling Universal SSL");

        let settings: UniversalSettings = self
            .request(
                Method::PATCH,
                &format!("/zones/{}/ssl/universal/settings", zone_id),
                Some(&json!({ "enabled": true })),
            )
            .await?;

        if !settings.enabled {
            return Err(ProviderError::Api {
                status: 200,
                message: "Universal SSL remained disabled after activation".to_string(),
            });
        }

        self.ssl_status(zone_id).await
    }

    async fn ssl_status(&self, zone_id: &str) -> Result<SslActivation, ProviderError> {
        let packs: Vec<CertificatePack> = self
            .request(
                Method::GET,
                &format!("/zones/{}/ssl/certificate_packs?status=all", zone_id),
                None,
            )
            .await?;

        select_active_pack(&packs)
    }

    fn name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Pick the active certificate pack that expires last
fn select_active_pack(packs: &[CertificatePack]) -> Result<SslActivation, ProviderError> {
    let mut best: Option<SslActivation> = None;

    for pack in packs.iter().filter(|p| p.status == "active") {
        let expires_at = pack
            .certificates
            .iter()
            .filter_map(|c| c.expires_on)
            .max()
            .ok_or_else(|| {
                ProviderError::Decode(format!(
                    "active certificate pack {} has no expiry",
                    pack.id
                ))
            })?;
        let issued_at = pack.certificates.iter().filter_map(|c| c.uploaded_on).max();

        let newer = best
            .as_ref()
            .and_then(|b| b.expires_at)
            .map_or(true, |current| expires_at > current);
        if newer {
            best = Some(SslActivation {
                state: SslState::Active,
                issued_at,
                expires_at: Some(expires_at),
            });
        }
    }

    Ok(best.unwrap_or_else(SslActivation::pending))
}

/// Decode a Cloudflare response envelope, failing closed on missing fields
fn decode_envelope<T: DeserializeOwned>(
    status: u16,
    retry_after: Option<u64>,
    body: &[u8],
) -> Result<T, ProviderError> {
    let ok_status = (200..300).contains(&status);

    let envelope: Envelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if ok_status => return Err(ProviderError::Decode(e.to_string())),
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            return Err(classify(
                status,
                retry_after,
                &[ApiMessage {
                    code: 0,
                    message: text,
                }],
            ));
        }
    };

    if !envelope.success || !ok_status {
        return Err(classify(status, retry_after, &envelope.errors));
    }

    let result = envelope
        .result
        .filter(|v| !v.is_null())
        .ok_or_else(|| ProviderError::Decode("response is missing `result`".to_string()))?;

    serde_json::from_value(result).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Map an error response onto the provider error taxonomy
fn classify(status: u16, retry_after: Option<u64>, errors: &[ApiMessage]) -> ProviderError {
    let message = if errors.is_empty() {
        format!("HTTP {}", status)
    } else {
        errors
            .iter()
            .map(|e| {
                if e.code == 0 {
                    e.message.clone()
                } else {
                    format!("{}: {}", e.code, e.message)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let lower = message.to_lowercase();
    let has_code = |code: i64| errors.iter().any(|e| e.code == code);

    if status == 429 {
        ProviderError::RateLimited {
            retry_after_secs: retry_after,
        }
    } else if status == 401
        || status == 403
        || has_code(CF_CODE_AUTH_ERROR)
        || has_code(CF_CODE_INVALID_TOKEN)
    {
        ProviderError::Unauthorized(message)
    } else if has_code(CF_CODE_ZONE_EXISTS) || lower.contains("already exists") {
        ProviderError::ZoneAlreadyExists(message)
    } else if lower.contains("already enabled") || lower.contains("already active") {
        ProviderError::AlreadyEnabled
    } else if lower.contains("not active") || lower.contains("pending activation") {
        ProviderError::ZoneNotActive(message)
    } else if status == 404 {
        ProviderError::NotFound(message)
    } else {
        ProviderError::Api { status, message }
    }
}

// ============================================================================
// Cloudflare API Types
// ============================================================================

/// Standard Cloudflare API response wrapper
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Option<Value>,
}

/// Cloudflare API error
#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

/// Zone information from Cloudflare API
#[derive(Debug, Deserialize)]
struct ZoneResponse {
    id: String,
    name: String,
    status: String,
    name_servers: Vec<String>,
}

impl TryFrom<ZoneResponse> for Zone {
    type Error = ProviderError;

    fn try_from(zone: ZoneResponse) -> Result<Self, Self::Error> {
        let state = match zone.status.as_str() {
            "active" => ZoneState::Active,
            "pending" | "initializing" => ZoneState::Pending,
            "moved" => ZoneState::Moved,
            "deleted" => ZoneState::Deleted,
            other => {
                return Err(ProviderError::Decode(format!(
                    "unknown zone status '{}' for zone {}",
                    other, zone.id
                )))
            }
        };

        Ok(Zone {
            id: zone.id,
            name: zone.name,
            state,
            name_servers: zone.name_servers,
        })
    }
}

/// Request body for creating a DNS record
#[derive(Debug, Serialize)]
struct CreateDnsRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// DNS record as returned by the API
#[derive(Debug, Deserialize)]
struct DnsRecordResponse {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    ttl: u32,
    /// Absent for record types that cannot be proxied
    #[serde(default)]
    proxied: bool,
}

impl From<DnsRecordResponse> for DnsRecord {
    fn from(r: DnsRecordResponse) -> Self {
        DnsRecord {
            id: r.id,
            record_type: r.record_type,
            name: r.name,
            content: r.content,
            ttl: r.ttl,
            proxied: r.proxied,
        }
    }
}

/// Response from delete endpoints
#[derive(Debug, Deserialize)]
struct IdResponse {
    #[allow(dead_code)]
    id: String,
}

/// Universal SSL settings
#[derive(Debug, Deserialize)]
struct UniversalSettings {
    enabled: bool,
}

/// Edge certificate pack
#[derive(Debug, Deserialize)]
struct CertificatePack {
    id: String,
    status: String,
    #[serde(default)]
    certificates: Vec<PackCertificate>,
}

#[derive(Debug, Deserialize)]
struct PackCertificate {
    #[serde(default)]
    uploaded_on: Option<DateTime<Utc>>,
    #[serde(default)]
    expires_on: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloudflare_provider_name() {
        let provider = CloudflareProvider::new(ProviderConfig::new("token", "acct"))
            .expect("valid config");
        assert_eq!(provider.name(), "cloudflare");
    }

    #[test]
    fn test_cloudflare_provider_invalid_token() {
        let result = CloudflareProvider::new(ProviderConfig::new("token\x00with\x00nulls", "acct"));
        assert!(matches!(result.unwrap_err(), ProviderError::Config(_)));
    }

    #[test]
    fn test_cloudflare_provider_requires_account() {
        let result = CloudflareProvider::new(ProviderConfig::new("token", " "));
        assert!(matches!(result.unwrap_err(), ProviderError::Config(_)));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = ProviderConfig::new("super-secret", "acct");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("acct"));
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(10), Duration::from_secs(2));
    }

    #[test]
    fn test_decode_fails_closed_on_missing_result() {
        let body = br#"{"success": true, "errors": [], "result": null}"#;
        let result: Result<ZoneResponse, _> = decode_envelope(200, None, body);
        assert!(matches!(result.unwrap_err(), ProviderError::Decode(_)));
    }

    #[test]
    fn test_decode_fails_closed_on_missing_field() {
        // name_servers is required
        let body = br#"{"success": true, "result": {"id": "z1", "name": "shop.example", "status": "pending"}}"#;
        let result: Result<ZoneResponse, _> = decode_envelope(200, None, body);
        assert!(matches!(result.unwrap_err(), ProviderError::Decode(_)));
    }

    #[test]
    fn test_unknown_zone_status_is_rejected() {
        let zone = ZoneResponse {
            id: "z1".to_string(),
            name: "shop.example".to_string(),
            status: "mystery".to_string(),
            name_servers: vec![],
        };
        assert!(matches!(
            Zone::try_from(zone).unwrap_err(),
            ProviderError::Decode(_)
        ));
    }

    #[test]
    fn test_classify_error_messages() {
        let msg = |code: i64, text: &str| ApiMessage {
            code,
            message: text.to_string(),
        };

        assert!(matches!(
            classify(429, Some(7), &[]),
            ProviderError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
        assert!(matches!(
            classify(403, None, &[msg(10000, "Authentication error")]),
            ProviderError::Unauthorized(_)
        ));
        assert!(matches!(
            classify(400, None, &[msg(1061, "shop.example already exists")]),
            ProviderError::ZoneAlreadyExists(_)
        ));
        assert!(matches!(
            classify(400, None, &[msg(1450, "Universal SSL is already enabled")]),
            ProviderError::AlreadyEnabled
        ));
        assert!(matches!(
            classify(400, None, &[msg(1010, "Zone is not active")]),
            ProviderError::ZoneNotActive(_)
        ));
        assert!(matches!(
            classify(404, None, &[msg(7003, "Could not route")]),
            ProviderError::NotFound(_)
        ));
        assert!(matches!(
            classify(400, None, &[msg(1004, "DNS Validation Error")]),
            ProviderError::Api { status: 400, .. }
        ));
    }

    #[test]
    fn test_select_active_pack_prefers_latest_expiry() {
        let ts = |s: &str| s.parse::<DateTime<Utc>>().unwrap();
        let packs = vec![
            CertificatePack {
                id: "old".to_string(),
                status: "active".to_string(),
                certificates: vec![PackCertificate {
                    uploaded_on: Some(ts("2026-01-01T00:00:00Z")),
                    expires_on: Some(ts("2026-04-01T00:00:00Z")),
                }],
            },
            CertificatePack {
                id: "new".to_string(),
                status: "active".to_string(),
                certificates: vec![PackCertificate {
                    uploaded_on: Some(ts("2026-03-01T00:00:00Z")),
                    expires_on: Some(ts("2026-06-01T00:00:00Z")),
                }],
            },
            CertificatePack {
                id: "queued".to_string(),
                status: "pending_validation".to_string(),
                certificates: vec![],
            },
        ];

        let activation = select_active_pack(&packs).unwrap();
        assert_eq!(activation.state, SslState::Active);
        assert_eq!(activation.expires_at, Some(ts("2026-06-01T00:00:00Z")));
        assert_eq!(activation.issued_at, Some(ts("2026-03-01T00:00:00Z")));
    }

    #[test]
    fn test_select_active_pack_without_active_is_pending() {
        let packs = vec![CertificatePack {
            id: "queued".to_string(),
            status: "initializing".to_string(),
            certificates: vec![],
        }];
        assert_eq!(select_active_pack(&packs).unwrap(), SslActivation::pending());
    }

    #[test]
    fn test_active_pack_without_expiry_fails_closed() {
        let packs = vec![CertificatePack {
            id: "broken".to_string(),
            status: "active".to_string(),
            certificates: vec![PackCertificate {
                uploaded_on: None,
                expires_on: None,
            }],
        }];
        assert!(matches!(
            select_active_pack(&packs).unwrap_err(),
            ProviderError::Decode(_)
        ));
    }

    // Integration tests with mock server are in tests/cloudflare_test.rs
}
