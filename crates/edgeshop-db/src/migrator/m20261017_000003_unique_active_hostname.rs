//! Enforce one live registration per hostname
//!
//! Inactive rows are kept for history, so the unique index only covers
//! domains that are not `inactive`. Both SQLite and PostgreSQL accept the
//! partial index syntax.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS ux_domains_live_hostname
            ON domains (hostname)
            WHERE status <> 'inactive'
            "#,
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .if_exists()
                    .name("ux_domains_live_hostname")
                    .table(Domains::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Domains {
    #[sea_orm(iden = "domains")]
    Table,
}
