//! Shared fixtures for control plane integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use edgeshop_control::{DomainOrchestrator, OrchestratorConfig};
use edgeshop_dns::{DnsVerifier, StaticLookup, VerifierConfig};
use edgeshop_provider::{
    DnsRecord, EdgeProvider, NewDnsRecord, ProviderError, SslActivation, SslState, Zone,
    ZoneState,
};
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const EDGE: &str = "edge.edgeshop.dev";
pub const TENANT: &str = "tenant-1";

pub async fn setup_test_db() -> DatabaseConnection {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let db = edgeshop_db::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    edgeshop_db::migrate(&db)
        .await
        .expect("Failed to run migrations");
    db
}

/// What the fake does when asked to activate SSL on a zone
#[derive(Debug, Clone, Copy)]
pub enum SslMode {
    /// Issue a fresh 90-day certificate on every call
    Issue,
    /// Report issuance as pending
    Pending,
    /// Report this exact validity window
    Fixed(DateTime<Utc>, DateTime<Utc>),
}

#[derive(Default)]
struct FakeState {
    zones: HashMap<String, Zone>,
    records: HashMap<String, Vec<DnsRecord>>,
    ssl: HashMap<String, SslMode>,
    issued: HashMap<String, SslActivation>,
    failures: HashMap<(&'static str, String), ProviderError>,
    delays: HashMap<String, Duration>,
    calls: HashMap<&'static str, usize>,
    next_id: u64,
}

/// In-process edge provider keeping zones, records and certificates in memory
///
/// Failures are injected per operation and key, where the key is the zone
/// hostname for `create_zone`/`find_zone` and the zone hostname for every
/// zone-scoped call as well.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Make `op` fail for `hostname` until cleared
    pub fn fail(&self, op: &'static str, hostname: &str, error: ProviderError) {
        self.with_state(|s| {
            s.failures.insert((op, hostname.to_string()), error);
        });
    }

    pub fn clear_failure(&self, op: &'static str, hostname: &str) {
        self.with_state(|s| {
            s.failures.remove(&(op, hostname.to_string()));
        });
    }

    /// Delay SSL activation for a zone
    pub fn delay_ssl(&self, hostname: &str, delay: Duration) {
        self.with_state(|s| {
            s.delays.insert(hostname.to_string(), delay);
        });
    }

    pub fn set_ssl_mode(&self, hostname: &str, mode: SslMode) {
        self.with_state(|s| {
            s.ssl.insert(hostname.to_string(), mode);
        });
    }

    pub fn set_zone_state(&self, hostname: &str, state: ZoneState) {
        self.with_state(|s| {
            if let Some(zone) = s.zones.values_mut().find(|z| z.name == hostname) {
                zone.state = state;
            }
        });
    }

    pub fn activate_zone(&self, hostname: &str) {
        self.set_zone_state(hostname, ZoneState::Active);
    }

    /// Drop a zone without going through the API, as if deleted out of band
    pub fn forget_zone(&self, hostname: &str) {
        self.with_state(|s| s.zones.retain(|_, z| z.name != hostname));
    }

    /// Seed a zone created outside this system
    pub fn seed_zone(&self, hostname: &str) -> Zone {
        self.with_state(|s| Self::insert_zone(s, hostname))
    }

    pub fn zone(&self, hostname: &str) -> Option<Zone> {
        self.with_state(|s| s.zones.values().find(|z| z.name == hostname).cloned())
    }

    pub fn records(&self, hostname: &str) -> Vec<DnsRecord> {
        self.with_state(|s| {
            let id = s.zones.values().find(|z| z.name == hostname).map(|z| z.id.clone());
            id.and_then(|id| s.records.get(&id).cloned()).unwrap_or_default()
        })
    }

    pub fn calls(&self, op: &'static str) -> usize {
        self.with_state(|s| s.calls.get(op).copied().unwrap_or(0))
    }

    fn insert_zone(s: &mut FakeState, hostname: &str) -> Zone {
        s.next_id += 1;
        let zone = Zone {
            id: format!("zone-{}", s.next_id),
            name: hostname.to_string(),
            state: ZoneState::Pending,
            name_servers: vec![
                "ada.ns.cloudflare.com".to_string(),
                "bob.ns.cloudflare.com".to_string(),
            ],
        };
        s.zones.insert(zone.id.clone(), zone.clone());
        zone
    }

    /// Record the call and return the injected failure, if any
    fn enter(&self, op: &'static str, hostname: &str) -> Result<(), ProviderError> {
        self.with_state(|s| {
            *s.calls.entry(op).or_default() += 1;
            match s.failures.get(&(op, hostname.to_string())) {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        })
    }

    fn zone_by_id(&self, zone_id: &str) -> Result<Zone, ProviderError> {
        self.with_state(|s| s.zones.get(zone_id).cloned())
            .ok_or_else(|| ProviderError::NotFound(format!("zone {}", zone_id)))
    }

    fn hostname_of(&self, zone_id: &str) -> String {
        self.zone_by_id(zone_id)
            .map(|z| z.name)
            .unwrap_or_else(|_| zone_id.to_string())
    }
}

#[async_trait]
impl EdgeProvider for FakeProvider {
    async fn create_zone(&self, hostname: &str) -> Result<Zone, ProviderError> {
        self.enter("create_zone", hostname)?;
        self.with_state(|s| {
            if s.zones.values().any(|z| z.name == hostname) {
                return Err(ProviderError::ZoneAlreadyExists(hostname.to_string()));
            }
            Ok(Self::insert_zone(s, hostname))
        })
    }

    async fn find_zone(&self, hostname: &str) -> Result<Option<Zone>, ProviderError> {
        self.enter("find_zone", hostname)?;
        Ok(self.zone(hostname))
    }

    async fn get_zone(&self, zone_id: &str) -> Result<Zone, ProviderError> {
        self.enter("get_zone", &self.hostname_of(zone_id))?;
        self.zone_by_id(zone_id)
    }

    async fn delete_zone(&self, zone_id: &str) -> Result<(), ProviderError> {
        self.enter("delete_zone", &self.hostname_of(zone_id))?;
        self.with_state(|s| {
            s.zones.remove(zone_id);
            s.records.remove(zone_id);
        });
        Ok(())
    }

    async fn create_dns_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, ProviderError> {
        self.enter("create_dns_record", &self.hostname_of(zone_id))?;
        self.zone_by_id(zone_id)?;
        Ok(self.with_state(|s| {
            s.next_id += 1;
            let created = DnsRecord {
                id: format!("rec-{}", s.next_id),
                record_type: record.record_type.clone(),
                name: record.name.clone(),
                content: record.content.clone(),
                ttl: record.ttl,
                proxied: record.proxied,
            };
            s.records
                .entry(zone_id.to_string())
                .or_default()
                .push(created.clone());
            created
        }))
    }

    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ProviderError> {
        self.enter("list_dns_records", &self.hostname_of(zone_id))?;
        self.zone_by_id(zone_id)?;
        Ok(self.with_state(|s| s.records.get(zone_id).cloned().unwrap_or_default()))
    }

    async fn delete_dns_record(&self, zone_id: &str, record_id: &str) -> Result<(), ProviderError> {
        self.enter("delete_dns_record", &self.hostname_of(zone_id))?;
        self.with_state(|s| {
            if let Some(records) = s.records.get_mut(zone_id) {
                records.retain(|r| r.id != record_id);
            }
        });
        Ok(())
    }

    async fn activate_ssl(&self, zone_id: &str) -> Result<SslActivation, ProviderError> {
        let hostname = self.hostname_of(zone_id);
        let delay = self.with_state(|s| s.delays.get(&hostname).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.enter("activate_ssl", &hostname)?;
        let zone = self.zone_by_id(zone_id)?;
        if zone.state != ZoneState::Active {
            return Err(ProviderError::ZoneNotActive(zone_id.to_string()));
        }

        let now = Utc::now();
        Ok(self.with_state(|s| {
            let activation = match s.ssl.get(&hostname).copied().unwrap_or(SslMode::Issue) {
                SslMode::Issue => SslActivation {
                    state: SslState::Active,
                    issued_at: Some(now),
                    expires_at: Some(now + ChronoDuration::days(90)),
                },
                SslMode::Pending => SslActivation::pending(),
                SslMode::Fixed(issued_at, expires_at) => SslActivation {
                    state: SslState::Active,
                    issued_at: Some(issued_at),
                    expires_at: Some(expires_at),
                },
            };
            s.issued.insert(zone_id.to_string(), activation.clone());
            activation
        }))
    }

    async fn ssl_status(&self, zone_id: &str) -> Result<SslActivation, ProviderError> {
        self.enter("ssl_status", &self.hostname_of(zone_id))?;
        self.zone_by_id(zone_id)?;
        Ok(self.with_state(|s| {
            s.issued
                .get(zone_id)
                .cloned()
                .unwrap_or_else(SslActivation::pending)
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub provider: Arc<FakeProvider>,
    pub dns: Arc<StaticLookup>,
    pub orchestrator: Arc<DomainOrchestrator>,
}

impl Harness {
    pub async fn new() -> Self {
        let provider = FakeProvider::new();
        let (orchestrator, dns) = orchestrator_with(provider.clone()).await;
        Self {
            db: orchestrator.db().clone(),
            provider,
            dns,
            orchestrator,
        }
    }

    /// Point the storefront host of `hostname` at the edge
    pub fn point_dns(&self, hostname: &str) {
        self.dns.add_zone(hostname);
        self.dns.add_cname(&format!("checkout.{}", hostname), EDGE);
    }

    /// Register a domain and take it to `verified` with an active zone
    pub async fn verified_domain(&self, hostname: &str) -> Uuid {
        let details = self
            .orchestrator
            .register_domain(hostname, TENANT)
            .await
            .expect("register");
        self.provider.activate_zone(hostname);
        self.point_dns(hostname);
        let outcome = self
            .orchestrator
            .verify_domain(details.domain.id)
            .await
            .expect("verify");
        assert!(outcome.verification.matched, "{:?}", outcome.verification);
        details.domain.id
    }

    /// Verified domain with an active certificate
    pub async fn active_domain(&self, hostname: &str) -> Uuid {
        let id = self.verified_domain(hostname).await;
        self.orchestrator.activate_ssl(id).await.expect("activate");
        id
    }
}

/// Orchestrator over a fresh database and an empty static DNS table
pub async fn orchestrator_with(
    provider: Arc<dyn EdgeProvider>,
) -> (Arc<DomainOrchestrator>, Arc<StaticLookup>) {
    let db = setup_test_db().await;
    let dns = Arc::new(StaticLookup::new());
    let verifier = Arc::new(DnsVerifier::new(dns.clone(), VerifierConfig::new(EDGE)));
    let orchestrator = Arc::new(DomainOrchestrator::new(
        db,
        provider,
        verifier,
        OrchestratorConfig::default(),
    ));
    (orchestrator, dns)
}
