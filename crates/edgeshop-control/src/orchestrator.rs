//! Zone & certificate orchestration
//!
//! Drives one domain through its lifecycle:
//!
//! ```text
//! pending --zone created--> zone_pending --DNS matched--> verified --SSL--> verified + ssl_active
//!    \                           |                            |
//!     +--provider error--> failed                             +--SSL error--> verified (error recorded)
//! ```
//!
//! Each operation is a short sequence of provider calls followed by one
//! database write. No lock is held across a provider call; callers serialize
//! operations on the same domain.

use crate::error::OrchestratorError;
use crate::hostname::{normalize_hostname, normalize_label};
use crate::lifecycle::{
    write_certificate_state, write_domain_state, CertificateState, DomainEvent, DomainState,
};
use chrono::{DateTime, Utc};
use edgeshop_db::entities::certificate::{self, CertificateStatus};
use edgeshop_db::entities::domain::{self, DnsRecordType, DomainStatus};
use edgeshop_db::entities::provider_zone::{self, ZoneStatus};
use edgeshop_db::entities::{Certificate, Domain, ProviderZone};
use edgeshop_dns::{DnsVerifier, VerificationResult};
use edgeshop_provider::{EdgeProvider, NewDnsRecord, ProviderError, SslState, Zone, ZoneState};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// TTL value the provider treats as "automatic" for proxied records
const AUTO_TTL: u32 = 1;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Label the storefront is served on, e.g. `checkout` for `checkout.shop.example`
    pub default_subdomain: String,
    /// Canonical edge hostname tenants CNAME to
    pub edge_hostname: String,
    /// TTL advertised in DNS instructions
    pub dns_ttl: u32,
    /// Create the edge record in proxied (anycast) mode
    pub proxied: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_subdomain: "checkout".to_string(),
            edge_hostname: "edge.edgeshop.dev".to_string(),
            dns_ttl: 300,
            proxied: true,
        }
    }
}

impl OrchestratorConfig {
    /// Normalize and check the configured names
    pub fn validated(mut self) -> Result<Self, OrchestratorError> {
        self.default_subdomain = normalize_label(&self.default_subdomain)?;
        self.edge_hostname = self
            .edge_hostname
            .trim()
            .trim_end_matches('.')
            .to_ascii_lowercase();
        if self.edge_hostname.is_empty() {
            return Err(OrchestratorError::InvalidHostname(
                crate::hostname::HostnameError::Empty,
            ));
        }
        Ok(self)
    }
}

/// A domain with its certificate and provider zone
#[derive(Debug, Clone)]
pub struct DomainDetails {
    pub domain: domain::Model,
    pub certificate: Option<certificate::Model>,
    pub zone: Option<provider_zone::Model>,
}

/// Result of a DNS verification pass
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub domain: domain::Model,
    pub verification: VerificationResult,
}

/// Result of an SSL activation that did not fail
#[derive(Debug, Clone)]
pub struct SslOutcome {
    pub domain: domain::Model,
    pub certificate: certificate::Model,
}

impl SslOutcome {
    /// Issuance still in progress at the provider
    pub fn is_pending(&self) -> bool {
        self.certificate.status == CertificateStatus::Pending
    }
}

pub struct DomainOrchestrator {
    db: DatabaseConnection,
    provider: Arc<dyn EdgeProvider>,
    verifier: Arc<DnsVerifier>,
    config: OrchestratorConfig,
}

impl DomainOrchestrator {
    pub fn new(
        db: DatabaseConnection,
        provider: Arc<dyn EdgeProvider>,
        verifier: Arc<DnsVerifier>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            db,
            provider,
            verifier,
            config,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a hostname for a tenant and create its provider zone
    ///
    /// Registering a hostname that is still pending for the same tenant
    /// returns the existing record. A failed registration for the same tenant
    /// is retried in place.
    pub async fn register_domain(
        &self,
        hostname: &str,
        tenant_id: &str,
    ) -> Result<DomainDetails, OrchestratorError> {
        let hostname = normalize_hostname(hostname)?;
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(OrchestratorError::MissingTenant);
        }

        if let Some(existing) = self.live_domain(&hostname).await? {
            return self.resume_registration(existing, tenant_id).await;
        }

        let now = Utc::now();
        let mut model = domain::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id.to_string()),
            hostname: Set(hostname.clone()),
            subdomain_label: Set(self.config.default_subdomain.clone()),
            provider_zone_id: Set(None),
            last_verified_at: Set(None),
            last_error: Set(None),
            dns_record_type: Set(DnsRecordType::Cname),
            dns_target: Set(self.config.edge_hostname.clone()),
            dns_ttl: Set(self.config.dns_ttl as i32),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        write_domain_state(&mut model, DomainState::Pending);

        // The unique index on live hostnames settles concurrent registrations
        let domain = match model.insert(&self.db).await {
            Ok(domain) => domain,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(domain = %hostname, "Lost registration race, resolving against the winner");
                return match self.live_domain(&hostname).await? {
                    Some(existing) => self.resume_registration(existing, tenant_id).await,
                    None => Err(OrchestratorError::AlreadyRegistered(hostname)),
                };
            }
            Err(e) => return Err(e.into()),
        };

        info!(domain = %hostname, tenant_id = %tenant_id, domain_id = %domain.id, "Registered domain");

        self.provision_zone(domain).await
    }

    async fn live_domain(&self, hostname: &str) -> Result<Option<domain::Model>, OrchestratorError> {
        Ok(Domain::find()
            .filter(domain::Column::Hostname.eq(hostname))
            .filter(domain::Column::Status.ne(DomainStatus::Inactive))
            .one(&self.db)
            .await?)
    }

    /// Answer a registration for a hostname that already has a live record
    async fn resume_registration(
        &self,
        existing: domain::Model,
        tenant_id: &str,
    ) -> Result<DomainDetails, OrchestratorError> {
        if existing.tenant_id != tenant_id {
            return Err(OrchestratorError::AlreadyRegistered(existing.hostname));
        }
        match existing.status {
            DomainStatus::Pending | DomainStatus::ZonePending => {
                debug!(domain = %existing.hostname, "Domain already registered, returning existing record");
                self.details(existing).await
            }
            DomainStatus::Failed => {
                info!(domain = %existing.hostname, "Retrying failed registration");
                self.provision_zone(existing).await
            }
            _ => Err(OrchestratorError::AlreadyRegistered(existing.hostname)),
        }
    }

    async fn provision_zone(
        &self,
        domain: domain::Model,
    ) -> Result<DomainDetails, OrchestratorError> {
        let zone = match self.provider.create_zone(&domain.hostname).await {
            Ok(zone) => zone,
            Err(ProviderError::ZoneAlreadyExists(message)) => {
                match self.provider.find_zone(&domain.hostname).await {
                    Ok(Some(zone)) => {
                        info!(domain = %domain.hostname, zone_id = %zone.id, "Adopting existing provider zone");
                        zone
                    }
                    Ok(None) => {
                        return Err(self
                            .fail_provisioning(domain, ProviderError::ZoneAlreadyExists(message))
                            .await)
                    }
                    Err(e) => return Err(self.fail_provisioning(domain, e).await),
                }
            }
            Err(e) => return Err(self.fail_provisioning(domain, e).await),
        };

        let now = Utc::now();
        let state = DomainState::of(&domain).apply(DomainEvent::ZoneCreated)?;

        let txn = self.db.begin().await?;

        let mut active: domain::ActiveModel = domain.into();
        write_domain_state(&mut active, state);
        active.provider_zone_id = Set(Some(zone.id.clone()));
        active.last_error = Set(None);
        active.updated_at = Set(now);
        let domain = active.update(&txn).await?;

        // A zone id maps to exactly one domain
        ProviderZone::delete_many()
            .filter(
                Condition::any()
                    .add(provider_zone::Column::Id.eq(zone.id.as_str()))
                    .add(provider_zone::Column::DomainId.eq(domain.id)),
            )
            .exec(&txn)
            .await?;
        let zone_row = zone_row(&zone, domain.id, now).insert(&txn).await?;

        txn.commit().await?;

        info!(
            domain = %domain.hostname,
            zone_id = %zone_row.id,
            nameservers = ?zone.name_servers,
            "Provider zone created"
        );

        let certificate = self.certificate_for(domain.id).await?;
        Ok(DomainDetails {
            domain,
            certificate,
            zone: Some(zone_row),
        })
    }

    /// Persist a provisioning failure and hand the error back
    async fn fail_provisioning(
        &self,
        domain: domain::Model,
        error: ProviderError,
    ) -> OrchestratorError {
        warn!(domain = %domain.hostname, error = %error, "Zone provisioning failed");

        let state = match DomainState::of(&domain).apply(DomainEvent::ProvisioningFailed) {
            Ok(state) => state,
            Err(e) => return e.into(),
        };
        let mut active: domain::ActiveModel = domain.into();
        write_domain_state(&mut active, state);
        active.last_error = Set(Some(format!("{}: {}", error.code(), error)));
        active.updated_at = Set(Utc::now());

        match active.update(&self.db).await {
            Ok(_) => OrchestratorError::Provider(error),
            Err(e) => OrchestratorError::Database(e),
        }
    }

    // ------------------------------------------------------------------
    // Zone sync
    // ------------------------------------------------------------------

    /// Refresh the stored zone from the provider
    ///
    /// A zone the provider reports as moved or deleted makes the domain inactive.
    pub async fn sync_zone(&self, domain_id: Uuid) -> Result<DomainDetails, OrchestratorError> {
        let domain = self.find(domain_id).await?;
        let (domain, _) = self.refresh_zone(domain).await?;
        self.details(domain).await
    }

    async fn refresh_zone(
        &self,
        domain: domain::Model,
    ) -> Result<(domain::Model, provider_zone::Model), OrchestratorError> {
        let zone_id = domain
            .provider_zone_id
            .clone()
            .ok_or_else(|| invalid_state(&domain, "no provider zone has been created"))?;

        let remote = match self.provider.get_zone(&zone_id).await {
            Ok(zone) => Some(zone),
            Err(ProviderError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let status = remote
            .as_ref()
            .map(|z| zone_status(z.state))
            .unwrap_or(ZoneStatus::Deleted);

        let txn = self.db.begin().await?;

        let zone_row = match ProviderZone::find_by_id(zone_id.clone()).one(&txn).await? {
            Some(existing) => {
                let mut active: provider_zone::ActiveModel = existing.into();
                active.status = Set(status.clone());
                if let Some(remote) = &remote {
                    active.nameservers = Set(provider_zone::Model::encode_nameservers(
                        &remote.name_servers,
                    ));
                }
                active.last_synced_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                let zone = remote.clone().unwrap_or_else(|| Zone {
                    id: zone_id.clone(),
                    name: domain.hostname.clone(),
                    state: ZoneState::Deleted,
                    name_servers: Vec::new(),
                });
                zone_row(&zone, domain.id, now).insert(&txn).await?
            }
        };

        let lost = matches!(status, ZoneStatus::Moved | ZoneStatus::Deleted);
        let domain = if lost && domain.status != DomainStatus::Inactive {
            warn!(domain = %domain.hostname, zone_id = %zone_id, status = ?status, "Provider zone lost, deactivating domain");
            let state = DomainState::of(&domain).apply(DomainEvent::ZoneLost)?;
            let mut active: domain::ActiveModel = domain.into();
            write_domain_state(&mut active, state);
            active.last_error = Set(Some(format!(
                "ZONE_LOST: provider reports zone {} as {:?}",
                zone_id, status
            )));
            active.updated_at = Set(now);
            active.update(&txn).await?
        } else {
            domain
        };

        txn.commit().await?;

        debug!(domain = %domain.hostname, zone_id = %zone_id, status = ?zone_row.status, "Zone synced");
        Ok((domain, zone_row))
    }

    /// Refresh the zone, falling back to the stored row when the provider is unreachable
    async fn current_zone(
        &self,
        domain: domain::Model,
    ) -> Result<(domain::Model, Option<provider_zone::Model>), OrchestratorError> {
        let domain_id = domain.id;
        let hostname = domain.hostname.clone();
        match self.refresh_zone(domain).await {
            Ok((domain, zone)) => Ok((domain, Some(zone))),
            Err(OrchestratorError::Provider(e)) => {
                warn!(domain = %hostname, error = %e, "Zone sync failed, using stored zone");
                let domain = self.find(domain_id).await?;
                let zone = self.zone_for(domain_id).await?;
                Ok((domain, zone))
            }
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // DNS verification
    // ------------------------------------------------------------------

    /// Check DNS for a domain and record the result
    ///
    /// Resolution failures never fail the call; they are stored on the
    /// domain as `last_error`. Safe to poll.
    pub async fn verify_domain(&self, domain_id: Uuid) -> Result<VerifyOutcome, OrchestratorError> {
        let domain = self.find(domain_id).await?;
        if !matches!(
            domain.status,
            DomainStatus::ZonePending | DomainStatus::Verified
        ) {
            return Err(invalid_state(
                &domain,
                "only domains with a provider zone can be verified",
            ));
        }

        let (domain, zone) = self.current_zone(domain).await?;
        if domain.status == DomainStatus::Inactive {
            return Err(invalid_state(&domain, "provider zone was moved or deleted"));
        }

        let mut record_error = None;
        if let Some(zone) = zone.as_ref().filter(|z| z.status == ZoneStatus::Active) {
            if let Err(e) = self.ensure_edge_record(&domain, &zone.id).await {
                warn!(domain = %domain.hostname, error = %e, "Failed to provision edge DNS record");
                record_error = Some(e);
            }
        }

        let verification = self
            .verifier
            .verify(&domain.hostname, &domain.subdomain_label)
            .await;

        let now = Utc::now();
        let state = DomainState::of(&domain);
        let hostname = domain.hostname.clone();
        let mut active: domain::ActiveModel = domain.into();

        if verification.matched {
            write_domain_state(&mut active, state.apply(DomainEvent::DnsVerified)?);
            active.last_verified_at = Set(Some(now));
            active.last_error = Set(None);
            info!(domain = %hostname, record_type = ?verification.record_type, "Domain verified");
        } else {
            write_domain_state(&mut active, state.apply(DomainEvent::DnsMismatch)?);
            let mut message = verification
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "DNS_ERROR: resolution did not match".to_string());
            if let Some(e) = record_error {
                message = format!("{}; edge record: {}: {}", message, e.code(), e);
            }
            active.last_error = Set(Some(message));
        }
        active.updated_at = Set(now);
        let domain = active.update(&self.db).await?;

        Ok(VerifyOutcome {
            domain,
            verification,
        })
    }

    /// Make sure `{label}.{hostname}` exists in the zone, pointing at the edge
    async fn ensure_edge_record(
        &self,
        domain: &domain::Model,
        zone_id: &str,
    ) -> Result<(), ProviderError> {
        let name = domain.storefront_host();
        let records = self.provider.list_dns_records(zone_id).await?;

        // Never clobber a record the tenant created themselves
        if records.iter().any(|r| r.name.eq_ignore_ascii_case(&name)) {
            return Ok(());
        }

        let record = NewDnsRecord {
            record_type: "CNAME".to_string(),
            name: name.clone(),
            content: self.config.edge_hostname.clone(),
            ttl: if self.config.proxied {
                AUTO_TTL
            } else {
                self.config.dns_ttl
            },
            proxied: self.config.proxied,
        };
        let created = self.provider.create_dns_record(zone_id, &record).await?;
        info!(domain = %domain.hostname, record_id = %created.id, name = %name, "Edge DNS record created");
        Ok(())
    }

    // ------------------------------------------------------------------
    // SSL
    // ------------------------------------------------------------------

    /// Activate (or renew) the edge certificate for a verified domain
    ///
    /// "Already enabled" from the provider counts as success. Failures are
    /// recorded on the certificate and domain before being returned.
    pub async fn activate_ssl(&self, domain_id: Uuid) -> Result<SslOutcome, OrchestratorError> {
        self.request_ssl(domain_id, None).await
    }

    /// Renew the edge certificate, giving the provider at most `limit` per call
    ///
    /// A call that runs past the limit is recorded as a retryable
    /// `PROVIDER_TIMEOUT` failure, the same as any other provider error.
    pub async fn renew_ssl(
        &self,
        domain_id: Uuid,
        limit: Duration,
    ) -> Result<SslOutcome, OrchestratorError> {
        self.request_ssl(domain_id, Some(limit)).await
    }

    async fn request_ssl(
        &self,
        domain_id: Uuid,
        limit: Option<Duration>,
    ) -> Result<SslOutcome, OrchestratorError> {
        let domain = self.find(domain_id).await?;
        if domain.status != DomainStatus::Verified {
            return Err(invalid_state(
                &domain,
                "domain must be verified before SSL activation",
            ));
        }

        let (domain, zone) = self.current_zone(domain).await?;
        if domain.status == DomainStatus::Inactive {
            return Err(invalid_state(&domain, "provider zone was moved or deleted"));
        }

        let now = Utc::now();
        let zone = match zone {
            Some(zone) if zone.status == ZoneStatus::Active => zone,
            _ => {
                let error = OrchestratorError::ZoneNotActive(domain.hostname.clone());
                return Err(self.record_ssl_failure(domain, error, now).await);
            }
        };

        let activation = match within(limit, self.provider.activate_ssl(&zone.id)).await {
            Ok(activation) => activation,
            Err(ProviderError::AlreadyEnabled) => {
                debug!(domain = %domain.hostname, "SSL already enabled, reading status");
                match within(limit, self.provider.ssl_status(&zone.id)).await {
                    Ok(activation) => activation,
                    Err(e) => return Err(self.record_ssl_failure(domain, e.into(), now).await),
                }
            }
            Err(ProviderError::ZoneNotActive(_)) => {
                let error = OrchestratorError::ZoneNotActive(domain.hostname.clone());
                return Err(self.record_ssl_failure(domain, error, now).await);
            }
            Err(e) => return Err(self.record_ssl_failure(domain, e.into(), now).await),
        };

        match activation.state {
            SslState::Pending => self.record_ssl_pending(domain, now).await,
            SslState::Active => {
                let state = activation
                    .expires_at
                    .ok_or_else(|| {
                        OrchestratorError::Provider(ProviderError::Decode(
                            "active certificate reported without expiry".to_string(),
                        ))
                    })
                    .and_then(|expires_at| {
                        let issued_at = activation.issued_at.unwrap_or(now);
                        CertificateState::activated(issued_at, expires_at).map_err(Into::into)
                    });
                match state {
                    Ok(state) => self.record_ssl_success(domain, state, now).await,
                    Err(e) => Err(self.record_ssl_failure(domain, e, now).await),
                }
            }
        }
    }

    async fn record_ssl_success(
        &self,
        domain: domain::Model,
        state: CertificateState,
        now: DateTime<Utc>,
    ) -> Result<SslOutcome, OrchestratorError> {
        let txn = self.db.begin().await?;

        let existing = Certificate::find()
            .filter(certificate::Column::DomainId.eq(domain.id))
            .one(&txn)
            .await?;
        let is_new = existing.is_none();
        // One certificate row per domain; a new issuance replaces the old one
        let mut cert = match existing {
            Some(existing) => existing.into(),
            None => self.new_certificate(domain.id, now),
        };
        write_certificate_state(&mut cert, state);
        cert.provider = Set(self.provider.name().to_string());
        cert.last_renewal_attempt_at = Set(Some(now));
        cert.renewal_error = Set(None);
        cert.updated_at = Set(now);
        let certificate = if is_new {
            cert.insert(&txn).await?
        } else {
            cert.update(&txn).await?
        };

        let next = DomainState::of(&domain).apply(DomainEvent::SslActivated)?;
        let mut active: domain::ActiveModel = domain.into();
        write_domain_state(&mut active, next);
        active.last_error = Set(None);
        active.updated_at = Set(now);
        let domain = active.update(&txn).await?;

        txn.commit().await?;

        info!(
            domain = %domain.hostname,
            expires_at = ?certificate.expires_at,
            "SSL certificate active"
        );
        Ok(SslOutcome {
            domain,
            certificate,
        })
    }

    async fn record_ssl_pending(
        &self,
        domain: domain::Model,
        now: DateTime<Utc>,
    ) -> Result<SslOutcome, OrchestratorError> {
        let txn = self.db.begin().await?;

        let existing = Certificate::find()
            .filter(certificate::Column::DomainId.eq(domain.id))
            .one(&txn)
            .await?;
        let is_new = existing.is_none();
        let mut cert = match existing {
            // A serving certificate keeps serving while the next one is issued
            Some(existing) if CertificateState::of(&existing).at(now).is_active() => {
                existing.into()
            }
            Some(existing) => {
                let mut cert: certificate::ActiveModel = existing.into();
                write_certificate_state(&mut cert, CertificateState::Pending);
                cert
            }
            None => {
                let mut cert = self.new_certificate(domain.id, now);
                write_certificate_state(&mut cert, CertificateState::Pending);
                cert
            }
        };
        cert.provider = Set(self.provider.name().to_string());
        cert.last_renewal_attempt_at = Set(Some(now));
        cert.updated_at = Set(now);
        let certificate = if is_new {
            cert.insert(&txn).await?
        } else {
            cert.update(&txn).await?
        };

        txn.commit().await?;

        info!(domain = %domain.hostname, "SSL issuance pending at provider");
        Ok(SslOutcome {
            domain,
            certificate,
        })
    }

    /// Persist an SSL failure and hand the error back
    async fn record_ssl_failure(
        &self,
        domain: domain::Model,
        error: OrchestratorError,
        now: DateTime<Utc>,
    ) -> OrchestratorError {
        warn!(domain = %domain.hostname, error = %error, retryable = error.is_retryable(), "SSL activation failed");

        match self.try_record_ssl_failure(domain, &error, now).await {
            Ok(()) => error,
            Err(db_error) => db_error,
        }
    }

    async fn try_record_ssl_failure(
        &self,
        domain: domain::Model,
        error: &OrchestratorError,
        now: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        let message = format!("{}: {}", error.code(), error);
        let txn = self.db.begin().await?;

        let existing = Certificate::find()
            .filter(certificate::Column::DomainId.eq(domain.id))
            .one(&txn)
            .await?;

        let still_serving = match existing {
            Some(existing) => {
                let next = CertificateState::of(&existing).after_failure(now);
                let mut cert: certificate::ActiveModel = existing.into();
                write_certificate_state(&mut cert, next);
                cert.last_renewal_attempt_at = Set(Some(now));
                cert.renewal_error = Set(Some(message.clone()));
                cert.updated_at = Set(now);
                cert.update(&txn).await?;
                next.is_active()
            }
            None => false,
        };

        let mut state = DomainState::of(&domain);
        if !still_serving {
            state = state.apply(DomainEvent::SslFailed)?;
        }
        let mut active: domain::ActiveModel = domain.into();
        write_domain_state(&mut active, state);
        active.last_error = Set(Some(message));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    fn new_certificate(&self, domain_id: Uuid, now: DateTime<Utc>) -> certificate::ActiveModel {
        certificate::ActiveModel {
            id: Set(Uuid::new_v4()),
            domain_id: Set(domain_id),
            provider: Set(self.provider.name().to_string()),
            auto_renew: Set(true),
            last_renewal_attempt_at: Set(None),
            renewal_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    }

    /// Mark active certificates past their expiry as expired
    ///
    /// Returns the number of certificates that lapsed.
    pub async fn expire_lapsed_certificates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, OrchestratorError> {
        let lapsed = Certificate::find()
            .filter(certificate::Column::Status.eq(CertificateStatus::Active))
            .filter(certificate::Column::ExpiresAt.lte(now))
            .all(&self.db)
            .await?;

        let mut count = 0;
        for cert in lapsed {
            let txn = self.db.begin().await?;
            let domain_id = cert.domain_id;
            let next = CertificateState::of(&cert).at(now);

            let mut active: certificate::ActiveModel = cert.into();
            write_certificate_state(&mut active, next);
            active.updated_at = Set(now);
            active.update(&txn).await?;

            if let Some(domain) = Domain::find_by_id(domain_id).one(&txn).await? {
                let state = DomainState::of(&domain).apply(DomainEvent::SslLapsed)?;
                info!(domain = %domain.hostname, "Certificate expired");
                let mut active: domain::ActiveModel = domain.into();
                write_domain_state(&mut active, state);
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }

            txn.commit().await?;
            count += 1;
        }

        Ok(count)
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Delete a domain, its certificate and its zone
    ///
    /// The upstream zone is removed best-effort; a provider failure is
    /// logged and does not block local deletion.
    pub async fn remove_domain(&self, domain_id: Uuid) -> Result<(), OrchestratorError> {
        let domain = self.find(domain_id).await?;

        let txn = self.db.begin().await?;
        Certificate::delete_many()
            .filter(certificate::Column::DomainId.eq(domain.id))
            .exec(&txn)
            .await?;
        ProviderZone::delete_many()
            .filter(provider_zone::Column::DomainId.eq(domain.id))
            .exec(&txn)
            .await?;
        Domain::delete_by_id(domain.id).exec(&txn).await?;
        txn.commit().await?;

        info!(domain = %domain.hostname, domain_id = %domain.id, "Domain removed");

        if let Some(zone_id) = &domain.provider_zone_id {
            // A re-registration may have adopted the same zone
            let still_used = Domain::find()
                .filter(domain::Column::ProviderZoneId.eq(zone_id.as_str()))
                .count(&self.db)
                .await?
                > 0;
            if still_used {
                debug!(zone_id = %zone_id, "Zone still referenced, keeping it upstream");
            } else if let Err(e) = self.provider.delete_zone(zone_id).await {
                warn!(
                    domain = %domain.hostname,
                    zone_id = %zone_id,
                    error = %e,
                    "Failed to delete provider zone; left in place"
                );
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_domain(&self, domain_id: Uuid) -> Result<DomainDetails, OrchestratorError> {
        let domain = self.find(domain_id).await?;
        self.details(domain).await
    }

    /// Domains, newest first, optionally for one tenant
    pub async fn list_domains(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<Vec<domain::Model>, OrchestratorError> {
        let mut query = Domain::find().order_by_desc(domain::Column::CreatedAt);
        if let Some(tenant_id) = tenant_id {
            query = query.filter(domain::Column::TenantId.eq(tenant_id));
        }
        Ok(query.all(&self.db).await?)
    }

    pub async fn certificate_for(
        &self,
        domain_id: Uuid,
    ) -> Result<Option<certificate::Model>, OrchestratorError> {
        Ok(Certificate::find()
            .filter(certificate::Column::DomainId.eq(domain_id))
            .one(&self.db)
            .await?)
    }

    async fn zone_for(
        &self,
        domain_id: Uuid,
    ) -> Result<Option<provider_zone::Model>, OrchestratorError> {
        Ok(ProviderZone::find()
            .filter(provider_zone::Column::DomainId.eq(domain_id))
            .one(&self.db)
            .await?)
    }

    async fn find(&self, domain_id: Uuid) -> Result<domain::Model, OrchestratorError> {
        find_domain(&self.db, domain_id).await
    }

    async fn details(&self, domain: domain::Model) -> Result<DomainDetails, OrchestratorError> {
        let certificate = self.certificate_for(domain.id).await?;
        let zone = self.zone_for(domain.id).await?;
        Ok(DomainDetails {
            domain,
            certificate,
            zone,
        })
    }
}

pub(crate) async fn find_domain<C: ConnectionTrait>(
    db: &C,
    domain_id: Uuid,
) -> Result<domain::Model, OrchestratorError> {
    Domain::find_by_id(domain_id)
        .one(db)
        .await?
        .ok_or(OrchestratorError::NotFound(domain_id))
}

/// Bound a provider call; running out of time is a provider timeout
async fn within<T>(
    limit: Option<Duration>,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(ProviderError::Timeout)),
        None => call.await,
    }
}

fn invalid_state(domain: &domain::Model, reason: &str) -> OrchestratorError {
    OrchestratorError::InvalidState {
        id: domain.id,
        status: domain.status.as_str(),
        reason: reason.to_string(),
    }
}

fn zone_status(state: ZoneState) -> ZoneStatus {
    match state {
        ZoneState::Pending => ZoneStatus::Pending,
        ZoneState::Active => ZoneStatus::Active,
        ZoneState::Moved => ZoneStatus::Moved,
        ZoneState::Deleted => ZoneStatus::Deleted,
    }
}

fn zone_row(zone: &Zone, domain_id: Uuid, now: DateTime<Utc>) -> provider_zone::ActiveModel {
    provider_zone::ActiveModel {
        id: Set(zone.id.clone()),
        domain_id: Set(domain_id),
        hostname: Set(zone.name.clone()),
        status: Set(zone_status(zone.state)),
        nameservers: Set(provider_zone::Model::encode_nameservers(&zone.name_servers)),
        last_synced_at: Set(now),
    }
}
