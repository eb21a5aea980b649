//! Provider-neutral resource types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Zone state as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneState {
    Pending,
    Active,
    Moved,
    Deleted,
}

/// A DNS zone hosted by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub state: ZoneState,
    /// Nameservers the registrar must delegate to, in provider order
    pub name_servers: Vec<String>,
}

/// A DNS record inside a provider zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// Parameters for creating a DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDnsRecord {
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl NewDnsRecord {
    /// Proxied CNAME pointing `name` at `target`
    pub fn proxied_cname(name: impl Into<String>, target: impl Into<String>, ttl: u32) -> Self {
        Self {
            record_type: "CNAME".to_string(),
            name: name.into(),
            content: target.into(),
            ttl,
            proxied: true,
        }
    }
}

/// Edge certificate state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslState {
    /// Certificate issued and served at the edge
    Active,
    /// Issuance in progress
    Pending,
}

/// Result of an SSL activation or status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslActivation {
    pub state: SslState,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SslActivation {
    pub fn pending() -> Self {
        Self {
            state: SslState::Pending,
            issued_at: None,
            expires_at: None,
        }
    }
}
