//! Edge/DNS provider client
//!
//! Thin, retrying HTTP binding for the provider that hosts storefront zones,
//! DNS records and edge certificates. The [`EdgeProvider`] trait is the seam
//! the orchestrator talks to; [`CloudflareProvider`] binds it to the
//! Cloudflare v4 REST API.

pub mod cloudflare;
pub mod error;
pub mod types;

pub use cloudflare::{CloudflareProvider, ProviderConfig, RetryPolicy};
pub use error::ProviderError;
pub use types::{DnsRecord, NewDnsRecord, SslActivation, SslState, Zone, ZoneState};

use async_trait::async_trait;

/// Zone, DNS record and SSL capabilities of an edge provider
#[async_trait]
pub trait EdgeProvider: Send + Sync {
    /// Create a zone for an apex hostname
    async fn create_zone(&self, hostname: &str) -> Result<Zone, ProviderError>;

    /// Look up an existing zone by name
    async fn find_zone(&self, hostname: &str) -> Result<Option<Zone>, ProviderError>;

    /// Fetch a zone by identifier
    async fn get_zone(&self, zone_id: &str) -> Result<Zone, ProviderError>;

    /// Delete a zone
    async fn delete_zone(&self, zone_id: &str) -> Result<(), ProviderError>;

    /// Create a DNS record in a zone
    async fn create_dns_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, ProviderError>;

    /// List DNS records in a zone
    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ProviderError>;

    /// Delete a DNS record
    async fn delete_dns_record(&self, zone_id: &str, record_id: &str)
        -> Result<(), ProviderError>;

    /// Enable edge certificate issuance for a zone and report the result
    async fn activate_ssl(&self, zone_id: &str) -> Result<SslActivation, ProviderError>;

    /// Current edge certificate state for a zone
    async fn ssl_status(&self, zone_id: &str) -> Result<SslActivation, ProviderError>;

    /// Provider name recorded on certificates
    fn name(&self) -> &'static str;
}
