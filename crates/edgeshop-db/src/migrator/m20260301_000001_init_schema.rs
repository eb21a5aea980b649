//! Initial schema: domains, certificates and provider zones

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. domains
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Domains::Table)
                    .if_not_exists()
                    .col(uuid(Domains::Id).primary_key())
                    .col(string_len(Domains::TenantId, 255))
                    .col(string_len(Domains::Hostname, 255))
                    .col(string_len(Domains::SubdomainLabel, 63).default("checkout"))
                    .col(string_len(Domains::Status, 32).default("pending"))
                    .col(boolean(Domains::DnsVerified).default(false))
                    .col(boolean(Domains::SslActive).default(false))
                    .col(string_len_null(Domains::ProviderZoneId, 64))
                    .col(timestamp_with_time_zone_null(Domains::LastVerifiedAt))
                    .col(text_null(Domains::LastError))
                    .col(string_len(Domains::DnsRecordType, 8).default("CNAME"))
                    .col(string_len(Domains::DnsTarget, 255))
                    .col(integer(Domains::DnsTtl).default(300))
                    .col(
                        timestamp_with_time_zone(Domains::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Domains::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_domains_hostname")
                    .table(Domains::Table)
                    .col(Domains::Hostname)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_domains_tenant_id")
                    .table(Domains::Table)
                    .col(Domains::TenantId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. certificates (one per domain)
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Certificates::Table)
                    .if_not_exists()
                    .col(uuid(Certificates::Id).primary_key())
                    .col(uuid(Certificates::DomainId).unique_key())
                    .col(string_len(Certificates::Provider, 64))
                    .col(string_len(Certificates::Status, 16).default("pending"))
                    .col(timestamp_with_time_zone_null(Certificates::IssuedAt))
                    .col(timestamp_with_time_zone_null(Certificates::ExpiresAt))
                    .col(boolean(Certificates::AutoRenew).default(true))
                    .col(timestamp_with_time_zone_null(
                        Certificates::LastRenewalAttemptAt,
                    ))
                    .col(text_null(Certificates::RenewalError))
                    .col(
                        timestamp_with_time_zone(Certificates::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Certificates::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_certificates_domain_id")
                            .from(Certificates::Table, Certificates::DomainId)
                            .to(Domains::Table, Domains::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Renewal scans filter on status and expiry
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_certificates_status_expires_at")
                    .table(Certificates::Table)
                    .col(Certificates::Status)
                    .col(Certificates::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. provider_zones (one per domain)
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(ProviderZones::Table)
                    .if_not_exists()
                    .col(string_len(ProviderZones::Id, 64).primary_key())
                    .col(uuid(ProviderZones::DomainId).unique_key())
                    .col(string_len(ProviderZones::Hostname, 255))
                    .col(string_len(ProviderZones::Status, 16).default("pending"))
                    .col(text(ProviderZones::Nameservers))
                    .col(
                        timestamp_with_time_zone(ProviderZones::LastSyncedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_zones_domain_id")
                            .from(ProviderZones::Table, ProviderZones::DomainId)
                            .to(Domains::Table, Domains::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProviderZones::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Certificates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Domains::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Domains {
    #[sea_orm(iden = "domains")]
    Table,
    Id,
    TenantId,
    Hostname,
    SubdomainLabel,
    Status,
    DnsVerified,
    SslActive,
    ProviderZoneId,
    LastVerifiedAt,
    LastError,
    DnsRecordType,
    DnsTarget,
    DnsTtl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Certificates {
    #[sea_orm(iden = "certificates")]
    Table,
    Id,
    DomainId,
    Provider,
    Status,
    IssuedAt,
    ExpiresAt,
    AutoRenew,
    LastRenewalAttemptAt,
    RenewalError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProviderZones {
    #[sea_orm(iden = "provider_zones")]
    Table,
    Id,
    DomainId,
    Hostname,
    Status,
    Nameservers,
    LastSyncedAt,
}
