//! RenewalLog entity: append-only audit trail of renewal attempts

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of one renewal attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum RenewalOutcome {
    #[sea_orm(string_value = "renewed")]
    Renewed,

    #[sea_orm(string_value = "skipped")]
    Skipped,

    #[sea_orm(string_value = "failed")]
    Failed,
}

impl RenewalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalOutcome::Renewed => "renewed",
            RenewalOutcome::Skipped => "skipped",
            RenewalOutcome::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "renewal_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Hostname the attempt was made for
    pub domain: String,

    #[sea_orm(indexed)]
    pub executed_at: ChronoDateTimeUtc,

    pub outcome: RenewalOutcome,

    #[sea_orm(column_type = "Text")]
    pub detail: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
