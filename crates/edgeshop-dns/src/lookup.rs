//! Resolver abstraction
//!
//! [`HickoryLookup`] resolves against real nameservers; [`StaticLookup`]
//! answers from an in-process table.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::error::ProtoErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Default per-query timeout
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// NXDOMAIN: the name does not exist
    #[error("name does not exist")]
    NotFound,
    /// The name exists but has no records of the requested type
    #[error("no records of the requested type")]
    NoRecords,
    #[error("DNS query timed out")]
    Timeout,
    #[error("DNS query failed: {0}")]
    Other(String),
}

impl LookupError {
    /// Whether the answer was an authoritative "nothing here"
    pub fn is_empty_answer(&self) -> bool {
        matches!(self, LookupError::NotFound | LookupError::NoRecords)
    }
}

impl From<ResolveError> for LookupError {
    fn from(e: ResolveError) -> Self {
        match e.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                if *response_code == ResponseCode::NXDomain {
                    LookupError::NotFound
                } else {
                    LookupError::NoRecords
                }
            }
            ResolveErrorKind::Timeout => LookupError::Timeout,
            ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
                LookupError::Timeout
            }
            _ => LookupError::Other(e.to_string()),
        }
    }
}

/// DNS queries the verifier needs
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// CNAME targets for `name`, normalized (lowercase, no trailing dot)
    async fn cname(&self, name: &str) -> Result<Vec<String>, LookupError>;

    /// IPv4 addresses for `name`
    async fn ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, LookupError>;

    /// Whether `name` exists at all (any record type, including an empty non-terminal)
    async fn exists(&self, name: &str) -> Result<bool, LookupError>;
}

/// Lowercase and strip the root label
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Resolver backed by hickory-resolver
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryLookup {
    /// Resolver using the system configuration (`/etc/resolv.conf`)
    pub fn from_system_conf() -> Result<Self, LookupError> {
        let (config, mut opts) = hickory_resolver::system_conf::read_system_conf()
            .map_err(|e| LookupError::Other(format!("failed to read resolver config: {}", e)))?;
        opts.timeout = DEFAULT_LOOKUP_TIMEOUT;
        Ok(Self::with_config(config, opts))
    }

    /// Resolver using public nameservers
    pub fn public() -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = DEFAULT_LOOKUP_TIMEOUT;
        opts.attempts = 2;
        Self::with_config(ResolverConfig::cloudflare(), opts)
    }

    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        // Total budget covers every attempt
        let timeout = opts.timeout * (opts.attempts.max(1) as u32 + 1);
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout,
        }
    }

    async fn query(
        &self,
        name: &str,
        record_type: RecordType,
    ) -> Result<hickory_resolver::lookup::Lookup, LookupError> {
        trace!(name = %name, record_type = %record_type, "DNS query");
        match tokio::time::timeout(self.timeout, self.resolver.lookup(name, record_type)).await {
            Ok(result) => result.map_err(LookupError::from),
            Err(_) => Err(LookupError::Timeout),
        }
    }
}

impl std::fmt::Debug for HickoryLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryLookup")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn cname(&self, name: &str) -> Result<Vec<String>, LookupError> {
        let lookup = self.query(name, RecordType::CNAME).await?;
        let targets = lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::CNAME(cname) => Some(normalize_name(&cname.0.to_ascii())),
                _ => None,
            })
            .collect();
        Ok(targets)
    }

    async fn ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, LookupError> {
        let lookup = self.query(name, RecordType::A).await?;
        let addrs = lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::A(a) => Some(a.0),
                _ => None,
            })
            .collect();
        Ok(addrs)
    }

    async fn exists(&self, name: &str) -> Result<bool, LookupError> {
        match self.query(name, RecordType::SOA).await {
            Ok(_) => Ok(true),
            Err(LookupError::NoRecords) => Ok(true),
            Err(LookupError::NotFound) => {
                debug!(name = %name, "NXDOMAIN");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Fixed-table resolver
///
/// Names are matched case-insensitively. A name "exists" if it was added as a
/// zone or if any record lives at or below it.
#[derive(Debug, Default)]
pub struct StaticLookup {
    table: RwLock<StaticTable>,
}

#[derive(Debug, Default)]
struct StaticTable {
    cnames: HashMap<String, Vec<String>>,
    addrs: HashMap<String, Vec<Ipv4Addr>>,
    zones: HashSet<String>,
    failures: HashMap<String, LookupError>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    fn write<F: FnOnce(&mut StaticTable)>(&self, f: F) {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        f(&mut table);
    }

    fn read<T, F: FnOnce(&StaticTable) -> T>(&self, f: F) -> T {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        f(&table)
    }

    pub fn add_cname(&self, name: &str, target: &str) {
        self.write(|t| {
            t.cnames
                .entry(normalize_name(name))
                .or_default()
                .push(normalize_name(target))
        });
    }

    pub fn add_a(&self, name: &str, addr: Ipv4Addr) {
        self.write(|t| t.addrs.entry(normalize_name(name)).or_default().push(addr));
    }

    pub fn add_zone(&self, name: &str) {
        self.write(|t| {
            t.zones.insert(normalize_name(name));
        });
    }

    /// Make every query for `name` fail with `error`
    pub fn fail(&self, name: &str, error: LookupError) {
        self.write(|t| {
            t.failures.insert(normalize_name(name), error);
        });
    }

    /// Forget everything recorded for `name`
    pub fn remove(&self, name: &str) {
        let name = normalize_name(name);
        self.write(|t| {
            t.cnames.remove(&name);
            t.addrs.remove(&name);
            t.zones.remove(&name);
            t.failures.remove(&name);
        });
    }

    fn check_failure(table: &StaticTable, name: &str) -> Result<(), LookupError> {
        match table.failures.get(name) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn name_exists(table: &StaticTable, name: &str) -> bool {
        let suffix = format!(".{}", name);
        let under = |key: &String| key == name || key.ends_with(&suffix);
        table.zones.iter().any(under)
            || table.cnames.keys().any(under)
            || table.addrs.keys().any(under)
    }
}

#[async_trait]
impl DnsLookup for StaticLookup {
    async fn cname(&self, name: &str) -> Result<Vec<String>, LookupError> {
        let name = normalize_name(name);
        self.read(|t| {
            Self::check_failure(t, &name)?;
            match t.cnames.get(&name) {
                Some(targets) => Ok(targets.clone()),
                None if Self::name_exists(t, &name) => Err(LookupError::NoRecords),
                None => Err(LookupError::NotFound),
            }
        })
    }

    async fn ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, LookupError> {
        let name = normalize_name(name);
        self.read(|t| {
            Self::check_failure(t, &name)?;
            match t.addrs.get(&name) {
                Some(addrs) => Ok(addrs.clone()),
                None if Self::name_exists(t, &name) => Err(LookupError::NoRecords),
                None => Err(LookupError::NotFound),
            }
        })
    }

    async fn exists(&self, name: &str) -> Result<bool, LookupError> {
        let name = normalize_name(name);
        self.read(|t| {
            Self::check_failure(t, &name)?;
            Ok(Self::name_exists(t, &name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Edge.Example.COM."), "edge.example.com");
        assert_eq!(normalize_name(" shop.example "), "shop.example");
    }

    #[test]
    fn test_empty_answer_classification() {
        assert!(LookupError::NotFound.is_empty_answer());
        assert!(LookupError::NoRecords.is_empty_answer());
        assert!(!LookupError::Timeout.is_empty_answer());
        assert!(!LookupError::Other("servfail".into()).is_empty_answer());
    }

    #[tokio::test]
    async fn test_static_lookup_records() {
        let lookup = StaticLookup::new();
        lookup.add_cname("Checkout.Shop.Example", "edge.edgeshop.dev.");
        lookup.add_a("www.shop.example", Ipv4Addr::new(192, 0, 2, 1));

        assert_eq!(
            lookup.cname("checkout.shop.example").await.unwrap(),
            vec!["edge.edgeshop.dev"]
        );
        assert_eq!(
            lookup.ipv4("www.shop.example").await.unwrap(),
            vec![Ipv4Addr::new(192, 0, 2, 1)]
        );
        assert_eq!(
            lookup.cname("www.shop.example").await.unwrap_err(),
            LookupError::NoRecords
        );
    }

    #[tokio::test]
    async fn test_static_lookup_existence() {
        let lookup = StaticLookup::new();
        lookup.add_zone("shop.example");
        lookup.add_a("www.other.example", Ipv4Addr::new(192, 0, 2, 1));

        assert!(lookup.exists("shop.example").await.unwrap());
        // Empty non-terminal above a record
        assert!(lookup.exists("other.example").await.unwrap());
        assert!(!lookup.exists("missing.example").await.unwrap());
        assert_eq!(
            lookup.ipv4("checkout.missing.example").await.unwrap_err(),
            LookupError::NotFound
        );
    }

    #[tokio::test]
    async fn test_static_lookup_failures_and_removal() {
        let lookup = StaticLookup::new();
        lookup.add_zone("shop.example");
        lookup.fail("shop.example", LookupError::Timeout);

        assert_eq!(
            lookup.exists("shop.example").await.unwrap_err(),
            LookupError::Timeout
        );

        lookup.remove("shop.example");
        assert!(!lookup.exists("shop.example").await.unwrap());
    }
}
