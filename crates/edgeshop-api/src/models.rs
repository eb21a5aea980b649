//! Request and response bodies for the REST API
//!
//! Every response carries `success`. Failures use [`ErrorResponse`].

use chrono::{DateTime, Utc};
use edgeshop_control::{BatchJob, DomainResult, IneligibleDomain, RunSummary, SchedulerConfig};
use edgeshop_db::entities::{certificate, domain, provider_zone, renewal_log};
use edgeshop_dns::VerificationResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// Human-readable detail
    pub error: String,
    /// Short machine-readable code
    pub code: String,
    /// Domains that blocked a batch submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ineligible: Option<Vec<IneligibleDomainView>>,
}

impl ErrorResponse {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.to_string(),
            ineligible: None,
        }
    }
}

// ----------------------------------------------------------------------
// Domains
// ----------------------------------------------------------------------

/// DNS record the tenant is asked to create
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    /// "CNAME" or "A"
    pub record_type: String,
    /// Host the record is created on, e.g. `checkout.shop.example`
    pub name: String,
    /// Expected record value
    pub target: String,
    pub ttl: i32,
}

/// Custom domain
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainView {
    pub id: Uuid,
    pub tenant_id: String,
    pub hostname: String,
    pub subdomain_label: String,
    /// pending, zone_pending, verified, failed or inactive
    pub status: String,
    pub dns_verified: bool,
    pub ssl_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub dns_config: DnsConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<domain::Model> for DomainView {
    fn from(d: domain::Model) -> Self {
        let dns_config = DnsConfig {
            record_type: match d.dns_record_type {
                domain::DnsRecordType::Cname => "CNAME".to_string(),
                domain::DnsRecordType::A => "A".to_string(),
            },
            name: d.storefront_host(),
            target: d.dns_target.clone(),
            ttl: d.dns_ttl,
        };
        Self {
            id: d.id,
            tenant_id: d.tenant_id,
            hostname: d.hostname,
            subdomain_label: d.subdomain_label,
            status: d.status.as_str().to_string(),
            dns_verified: d.dns_verified,
            ssl_active: d.ssl_active,
            provider_zone_id: d.provider_zone_id,
            last_verified_at: d.last_verified_at,
            last_error: d.last_error,
            dns_config,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

/// Edge certificate
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateView {
    pub id: Uuid,
    pub provider: String,
    /// pending, active, expired, revoked or error
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_renewal_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_error: Option<String>,
}

impl From<certificate::Model> for CertificateView {
    fn from(c: certificate::Model) -> Self {
        Self {
            id: c.id,
            provider: c.provider,
            status: c.status.as_str().to_string(),
            issued_at: c.issued_at,
            expires_at: c.expires_at,
            auto_renew: c.auto_renew,
            last_renewal_attempt_at: c.last_renewal_attempt_at,
            renewal_error: c.renewal_error,
        }
    }
}

/// Provider zone with delegation instructions
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneView {
    pub id: String,
    pub hostname: String,
    /// pending, active, moved or deleted
    pub status: String,
    /// Nameservers to set at the registrar
    pub nameservers: Vec<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl From<provider_zone::Model> for ZoneView {
    fn from(z: provider_zone::Model) -> Self {
        Self {
            nameservers: z.nameserver_list(),
            id: z.id,
            hostname: z.hostname,
            status: z.status.as_str().to_string(),
            last_synced_at: z.last_synced_at,
        }
    }
}

/// Request to register a custom domain
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDomainRequest {
    /// Apex hostname, e.g. `shop.example`
    pub hostname: String,
    pub tenant_id: String,
}

/// Domain with its certificate and zone
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainResponse {
    pub success: bool,
    pub domain: DomainView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<ZoneView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DomainListResponse {
    pub success: bool,
    pub domains: Vec<DomainView>,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct DomainListQuery {
    /// Only domains of this tenant
    pub tenant_id: Option<String>,
}

/// DNS check result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationView {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    pub observed_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<VerificationResult> for VerificationView {
    fn from(v: VerificationResult) -> Self {
        Self {
            matched: v.matched,
            record_type: v.record_type.map(|k| k.as_str().to_string()),
            observed_values: v.observed_values,
            code: v.error.as_ref().map(|e| e.code.as_str().to_string()),
            error: v.error.map(|e| e.message),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub domain: DomainView,
    pub verification: VerificationView,
}

// ----------------------------------------------------------------------
// SSL
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSslRequest {
    pub domain_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SslResponse {
    pub success: bool,
    /// Issuance still in progress at the provider
    pub pending: bool,
    pub domain: DomainView,
    pub certificate: CertificateView,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmitRequest {
    pub domain_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmitResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub status: String,
    pub total_count: usize,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct JobQuery {
    /// Job to read or cancel; omit on GET to list all jobs
    pub job_id: Option<Uuid>,
}

/// Domain that blocked a batch
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IneligibleDomainView {
    pub domain_id: Uuid,
    /// Current status, absent if the domain does not exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<IneligibleDomain> for IneligibleDomainView {
    fn from(d: IneligibleDomain) -> Self {
        Self {
            domain_id: d.domain_id,
            status: d.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainResultView {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub retryable: bool,
}

impl From<DomainResult> for DomainResultView {
    fn from(r: DomainResult) -> Self {
        Self {
            success: r.success,
            error: r.error,
            code: r.code,
            retryable: r.retryable,
        }
    }
}

/// Batch SSL job
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobView {
    pub id: Uuid,
    /// pending, running, completed or failed
    pub status: String,
    pub domain_ids: Vec<Uuid>,
    pub progress_count: usize,
    pub total_count: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Keyed by domain id
    pub results: HashMap<Uuid, DomainResultView>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BatchJob> for BatchJobView {
    fn from(job: BatchJob) -> Self {
        Self {
            succeeded: job.succeeded(),
            failed: job.failed(),
            id: job.id,
            status: job.status.as_str().to_string(),
            domain_ids: job.domain_ids,
            progress_count: job.progress_count,
            total_count: job.total_count,
            results: job
                .results
                .into_iter()
                .map(|(id, r)| (id, r.into()))
                .collect(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error: job.error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchJobResponse {
    pub success: bool,
    pub job: BatchJobView,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchJobListResponse {
    pub success: bool,
    pub jobs: Vec<BatchJobView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteDomainResponse {
    pub success: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelResponse {
    pub success: bool,
    /// False when the job had already finished
    pub cancelled: bool,
}

// ----------------------------------------------------------------------
// Renewal scheduler
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CronConfigView {
    pub interval_secs: u64,
    pub days_before_expiry: u32,
    pub max_per_run: u32,
    pub renewal_timeout_secs: u64,
}

impl From<SchedulerConfig> for CronConfigView {
    fn from(c: SchedulerConfig) -> Self {
        Self {
            interval_secs: c.interval.as_secs(),
            days_before_expiry: c.days_before_expiry,
            max_per_run: c.max_per_run,
            renewal_timeout_secs: c.renewal_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSummaryView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub candidates: usize,
    pub renewed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub expired: u64,
}

impl From<RunSummary> for RunSummaryView {
    fn from(s: RunSummary) -> Self {
        Self {
            started_at: s.started_at,
            finished_at: s.finished_at,
            candidates: s.candidates,
            renewed: s.renewed,
            skipped: s.skipped,
            failed: s.failed,
            expired: s.expired,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenewalLogView {
    pub id: Uuid,
    pub domain: String,
    pub executed_at: DateTime<Utc>,
    /// renewed, skipped or failed
    pub outcome: String,
    pub detail: String,
}

impl From<renewal_log::Model> for RenewalLogView {
    fn from(l: renewal_log::Model) -> Self {
        Self {
            id: l.id,
            domain: l.domain,
            executed_at: l.executed_at,
            outcome: l.outcome.as_str().to_string(),
            detail: l.detail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CronStatusResponse {
    pub success: bool,
    /// Timer is active
    pub running: bool,
    pub pass_in_progress: bool,
    pub config: CronConfigView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunSummaryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    pub recent_logs: Vec<RenewalLogView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CronAction {
    Start,
    Stop,
    /// Trigger one pass now
    Run,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CronActionRequest {
    pub action: CronAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CronActionResponse {
    pub success: bool,
    pub action: CronAction,
    /// False when the action was a no-op (already started, already stopped,
    /// pass already running)
    pub changed: bool,
}

/// Partial scheduler configuration update
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CronConfigUpdate {
    pub interval_secs: Option<u64>,
    pub days_before_expiry: Option<u32>,
    pub max_per_run: Option<u32>,
    pub renewal_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CronConfigResponse {
    pub success: bool,
    pub config: CronConfigView,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct PruneQuery {
    /// Keep entries newer than this many days (1-365, default 30)
    pub days_to_keep: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PruneResponse {
    pub success: bool,
    pub deleted: u64,
}
