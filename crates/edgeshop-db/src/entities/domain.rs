//! Domain entity: one custom hostname bound to a tenant storefront

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a custom domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    /// Registered, no provider zone yet
    #[sea_orm(string_value = "pending")]
    Pending,

    /// Provider zone created, waiting for DNS to point at the edge
    #[sea_orm(string_value = "zone_pending")]
    ZonePending,

    /// DNS resolution confirmed
    #[sea_orm(string_value = "verified")]
    Verified,

    /// Provisioning failed
    #[sea_orm(string_value = "failed")]
    Failed,

    /// Zone no longer served by the provider
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Pending => "pending",
            DomainStatus::ZonePending => "zone_pending",
            DomainStatus::Verified => "verified",
            DomainStatus::Failed => "failed",
            DomainStatus::Inactive => "inactive",
        }
    }
}

/// DNS record type tenants are asked to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum DnsRecordType {
    #[sea_orm(string_value = "CNAME")]
    #[serde(rename = "CNAME")]
    Cname,

    #[sea_orm(string_value = "A")]
    #[serde(rename = "A")]
    A,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "domains")]
pub struct Model {
    /// Domain UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant (store) owning this domain
    #[sea_orm(indexed)]
    pub tenant_id: String,

    /// Apex hostname, lowercase (e.g. "shop.example")
    #[sea_orm(indexed)]
    pub hostname: String,

    /// Label the storefront is served on (e.g. "checkout")
    pub subdomain_label: String,

    /// Lifecycle status
    pub status: DomainStatus,

    /// Whether the last DNS check matched an expected target
    pub dns_verified: bool,

    /// Whether an active, unexpired certificate is bound to the domain
    pub ssl_active: bool,

    /// Provider zone identifier once the zone exists
    pub provider_zone_id: Option<String>,

    /// When DNS last matched
    pub last_verified_at: Option<ChronoDateTimeUtc>,

    /// Last diagnostic recorded for this domain
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    /// Expected record type for `{subdomain_label}.{hostname}`
    pub dns_record_type: DnsRecordType,

    /// Expected record target
    pub dns_target: String,

    /// Record TTL in seconds
    pub dns_ttl: i32,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Fully-qualified storefront hostname
    pub fn storefront_host(&self) -> String {
        if self.subdomain_label.is_empty() {
            self.hostname.clone()
        } else {
            format!("{}.{}", self.subdomain_label, self.hostname)
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::certificate::Entity")]
    Certificate,

    #[sea_orm(has_one = "super::provider_zone::Entity")]
    ProviderZone,
}

impl Related<super::certificate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Certificate.def()
    }
}

impl Related<super::provider_zone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderZone.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
