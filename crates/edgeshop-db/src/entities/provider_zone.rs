//! ProviderZone entity: the edge provider's DNS zone for a domain

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Zone status as last reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    /// Waiting for the registrar to delegate to the provider's nameservers
    #[sea_orm(string_value = "pending")]
    Pending,

    /// Delegation confirmed, records and certificates can be managed
    #[sea_orm(string_value = "active")]
    Active,

    /// Zone moved to another account or provider
    #[sea_orm(string_value = "moved")]
    Moved,

    /// Zone removed upstream
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

impl ZoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneStatus::Pending => "pending",
            ZoneStatus::Active => "active",
            ZoneStatus::Moved => "moved",
            ZoneStatus::Deleted => "deleted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "provider_zones")]
pub struct Model {
    /// Provider zone identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Domain this zone serves
    #[sea_orm(unique)]
    pub domain_id: Uuid,

    pub hostname: String,

    pub status: ZoneStatus,

    /// Nameservers assigned by the provider, JSON array in provider order
    #[sea_orm(column_type = "Text")]
    pub nameservers: String,

    pub last_synced_at: ChronoDateTimeUtc,
}

impl Model {
    /// Nameservers in the order the provider returned them
    pub fn nameserver_list(&self) -> Vec<String> {
        serde_json::from_str(&self.nameservers).unwrap_or_default()
    }

    /// Encode a nameserver list for storage
    pub fn encode_nameservers(nameservers: &[String]) -> String {
        serde_json::to_string(nameservers).unwrap_or_else(|_| "[]".to_string())
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
