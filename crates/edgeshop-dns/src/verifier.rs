//! Domain verification against the edge
//!
//! Resolution order for `{label}.{hostname}`:
//!
//! 1. CNAME: matched when the target equals the edge hostname or is a
//!    subdomain of it. A CNAME anywhere else is a mismatch and reported.
//! 2. A records: matched when any address is one of our own edge IPs or
//!    falls inside the provider's anycast ranges.
//! 3. Nothing at the subdomain: the apex is probed so "domain not found"
//!    can be told apart from "subdomain not configured".
//!
//! Resolution problems never surface as errors; they produce an unmatched
//! [`VerificationResult`] carrying a [`VerificationFailure`].

use crate::lookup::{normalize_name, DnsLookup, LookupError};
use crate::ranges::IpRangeSet;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::{debug, info};

/// Record type a verification was decided on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordKind {
    #[serde(rename = "CNAME")]
    Cname,
    #[serde(rename = "A")]
    A,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Cname => "CNAME",
            RecordKind::A => "A",
        }
    }
}

/// Differentiated verification diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    /// The apex hostname does not resolve at all
    DomainNotFound,
    /// The apex exists but `{label}.{hostname}` has no CNAME or A records
    SubdomainNotConfigured,
    CnameTargetMismatch,
    ARecordMismatch,
    DnsTimeout,
    DnsError,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::DomainNotFound => "DOMAIN_NOT_FOUND",
            FailureCode::SubdomainNotConfigured => "SUBDOMAIN_NOT_CONFIGURED",
            FailureCode::CnameTargetMismatch => "CNAME_TARGET_MISMATCH",
            FailureCode::ARecordMismatch => "A_RECORD_MISMATCH",
            FailureCode::DnsTimeout => "DNS_TIMEOUT",
            FailureCode::DnsError => "DNS_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationFailure {
    pub code: FailureCode,
    pub message: String,
}

impl std::fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub matched: bool,
    pub record_type: Option<RecordKind>,
    /// CNAME targets or A addresses seen, in resolver order
    pub observed_values: Vec<String>,
    pub error: Option<VerificationFailure>,
}

impl VerificationResult {
    fn matched(record_type: RecordKind, observed_values: Vec<String>) -> Self {
        Self {
            matched: true,
            record_type: Some(record_type),
            observed_values,
            error: None,
        }
    }

    fn failed(
        record_type: Option<RecordKind>,
        observed_values: Vec<String>,
        code: FailureCode,
        message: String,
    ) -> Self {
        Self {
            matched: false,
            record_type,
            observed_values,
            error: Some(VerificationFailure { code, message }),
        }
    }
}

/// What counts as "pointing at us"
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Canonical edge hostname CNAMEs should target
    pub edge_hostname: String,
    /// Our own static edge addresses
    pub edge_ips: Vec<Ipv4Addr>,
    /// Provider anycast ranges (proxied records)
    pub anycast_ranges: IpRangeSet,
}

impl VerifierConfig {
    pub fn new(edge_hostname: impl AsRef<str>) -> Self {
        Self {
            edge_hostname: normalize_name(edge_hostname.as_ref()),
            edge_ips: Vec::new(),
            anycast_ranges: IpRangeSet::cloudflare_default(),
        }
    }

    pub fn with_edge_ips(mut self, edge_ips: Vec<Ipv4Addr>) -> Self {
        self.edge_ips = edge_ips;
        self
    }

    pub fn with_anycast_ranges(mut self, ranges: IpRangeSet) -> Self {
        self.anycast_ranges = ranges;
        self
    }

    fn cname_matches(&self, target: &str) -> bool {
        let target = normalize_name(target);
        target == self.edge_hostname || target.ends_with(&format!(".{}", self.edge_hostname))
    }

    fn ip_matches(&self, ip: &Ipv4Addr) -> bool {
        self.edge_ips.contains(ip) || self.anycast_ranges.contains(&IpAddr::V4(*ip))
    }
}

/// Checks custom-domain resolution against the edge
pub struct DnsVerifier {
    lookup: Arc<dyn DnsLookup>,
    config: VerifierConfig,
}

impl DnsVerifier {
    pub fn new(lookup: Arc<dyn DnsLookup>, config: VerifierConfig) -> Self {
        Self { lookup, config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify that `{subdomain_label}.{hostname}` reaches the edge
    pub async fn verify(&self, hostname: &str, subdomain_label: &str) -> VerificationResult {
        let hostname = normalize_name(hostname);
        let fqdn = format!("{}.{}", normalize_name(subdomain_label), hostname);

        let result = self.verify_fqdn(&hostname, &fqdn).await;

        match &result.error {
            None => info!(
                host = %fqdn,
                record_type = ?result.record_type,
                "DNS verified"
            ),
            Some(failure) => debug!(
                host = %fqdn,
                code = failure.code.as_str(),
                observed = ?result.observed_values,
                "DNS not verified"
            ),
        }
        result
    }

    async fn verify_fqdn(&self, hostname: &str, fqdn: &str) -> VerificationResult {
        // CNAME first. A hard error here is not final: A records may still answer.
        let mut cname_error = None;
        match self.lookup.cname(fqdn).await {
            Ok(targets) if !targets.is_empty() => return self.classify_cname(fqdn, targets),
            Ok(_) => {}
            Err(e) if e.is_empty_answer() => {}
            Err(LookupError::Timeout) => return timeout_result(fqdn),
            Err(e) => cname_error = Some(e),
        }

        match self.lookup.ipv4(fqdn).await {
            Ok(addrs) if !addrs.is_empty() => return self.classify_addrs(fqdn, addrs),
            Ok(_) => {}
            Err(e) if e.is_empty_answer() => {}
            Err(LookupError::Timeout) => return timeout_result(fqdn),
            Err(e) => return error_result(fqdn, &e),
        }

        if let Some(e) = cname_error {
            return error_result(fqdn, &e);
        }

        match self.lookup.exists(hostname).await {
            Ok(false) => VerificationResult::failed(
                None,
                Vec::new(),
                FailureCode::DomainNotFound,
                format!("{} does not resolve; check the domain is registered", hostname),
            ),
            Ok(true) => VerificationResult::failed(
                None,
                Vec::new(),
                FailureCode::SubdomainNotConfigured,
                format!(
                    "{} has no CNAME or A record; add a CNAME pointing to {}",
                    fqdn, self.config.edge_hostname
                ),
            ),
            Err(LookupError::Timeout) => timeout_result(hostname),
            Err(e) => error_result(hostname, &e),
        }
    }

    fn classify_cname(&self, fqdn: &str, targets: Vec<String>) -> VerificationResult {
        if targets.iter().any(|t| self.config.cname_matches(t)) {
            return VerificationResult::matched(RecordKind::Cname, targets);
        }

        let message = format!(
            "{} is a CNAME to {}, expected {}",
            fqdn,
            targets.join(", "),
            self.config.edge_hostname
        );
        VerificationResult::failed(
            Some(RecordKind::Cname),
            targets,
            FailureCode::CnameTargetMismatch,
            message,
        )
    }

    fn classify_addrs(&self, fqdn: &str, addrs: Vec<Ipv4Addr>) -> VerificationResult {
        let matched = addrs.iter().any(|ip| self.config.ip_matches(ip));
        let observed: Vec<String> = addrs.iter().map(ToString::to_string).collect();

        if matched {
            return VerificationResult::matched(RecordKind::A, observed);
        }

        let message = format!(
            "{} resolves to {}, which is not an edge address",
            fqdn,
            observed.join(", ")
        );
        VerificationResult::failed(
            Some(RecordKind::A),
            observed,
            FailureCode::ARecordMismatch,
            message,
        )
    }
}

fn timeout_result(name: &str) -> VerificationResult {
    VerificationResult::failed(
        None,
        Vec::new(),
        FailureCode::DnsTimeout,
        format!("DNS lookup for {} timed out", name),
    )
}

fn error_result(name: &str, error: &LookupError) -> VerificationResult {
    VerificationResult::failed(
        None,
        Vec::new(),
        FailureCode::DnsError,
        format!("DNS lookup for {} failed: {}", name, error),
    )
}
