//! Database migrations

use sea_orm_migration::prelude::*;

mod m20260301_000001_init_schema;
mod m20260301_000002_create_renewal_log;
mod m20261017_000003_unique_active_hostname;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_init_schema::Migration),
            Box::new(m20260301_000002_create_renewal_log::Migration),
            Box::new(m20261017_000003_unique_active_hostname::Migration),
        ]
    }
}
