//! Migration to create the renewal_log audit table

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RenewalLog::Table)
                    .if_not_exists()
                    .col(uuid(RenewalLog::Id).primary_key())
                    .col(string_len(RenewalLog::Domain, 255))
                    .col(
                        timestamp_with_time_zone(RenewalLog::ExecutedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(string_len(RenewalLog::Outcome, 16))
                    .col(text(RenewalLog::Detail))
                    .to_owned(),
            )
            .await?;

        // Retention sweeps delete by age
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_renewal_log_executed_at")
                    .table(RenewalLog::Table)
                    .col(RenewalLog::ExecutedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RenewalLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RenewalLog {
    #[sea_orm(iden = "renewal_log")]
    Table,
    Id,
    Domain,
    ExecutedAt,
    Outcome,
    Detail,
}
