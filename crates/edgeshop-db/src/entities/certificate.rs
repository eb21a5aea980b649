//! Certificate entity: the TLS certificate bound to a domain

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a domain certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    /// Issuance requested, not yet served
    #[sea_orm(string_value = "pending")]
    Pending,

    /// Certificate active and valid
    #[sea_orm(string_value = "active")]
    Active,

    /// Certificate expired
    #[sea_orm(string_value = "expired")]
    Expired,

    /// Certificate revoked or replaced
    #[sea_orm(string_value = "revoked")]
    Revoked,

    /// Last activation attempt failed
    #[sea_orm(string_value = "error")]
    Error,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Pending => "pending",
            CertificateStatus::Active => "active",
            CertificateStatus::Expired => "expired",
            CertificateStatus::Revoked => "revoked",
            CertificateStatus::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "certificates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning domain (one certificate per domain)
    #[sea_orm(unique)]
    pub domain_id: Uuid,

    /// Name of the provider that issued the certificate
    pub provider: String,

    pub status: CertificateStatus,

    pub issued_at: Option<ChronoDateTimeUtc>,

    #[sea_orm(indexed)]
    pub expires_at: Option<ChronoDateTimeUtc>,

    /// Whether the renewal scheduler should pick this certificate up
    pub auto_renew: bool,

    pub last_renewal_attempt_at: Option<ChronoDateTimeUtc>,

    #[sea_orm(column_type = "Text", nullable)]
    pub renewal_error: Option<String>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    /// Active and not yet past its expiry
    pub fn is_valid_at(&self, now: ChronoDateTimeUtc) -> bool {
        self.status == CertificateStatus::Active && self.expires_at.is_some_and(|exp| exp > now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::domain::Entity",
        from = "Column::DomainId",
        to = "super::domain::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Domain,
}

impl Related<super::domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Domain.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
