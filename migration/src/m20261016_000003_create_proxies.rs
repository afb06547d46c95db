use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Proxies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Proxies::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Proxies::PropertyUnitId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Proxies::DelegateName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Proxies::DelegateDocumentType).string_len(128))
                    .col(
                        ColumnDef::new(Proxies::DelegateDocumentNumber)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Proxies::DelegateEmail).string_len(128))
                    .col(ColumnDef::new(Proxies::DelegatePhone).string_len(128))
                    .col(ColumnDef::new(Proxies::ProxyType).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Proxies::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Proxies::EndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Proxies::PowerOfAttorneyRef).string_len(256))
                    .col(
                        ColumnDef::new(Proxies::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Proxies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proxies_property_unit")
                            .from(Proxies::Table, Proxies::PropertyUnitId)
                            .to(PropertyUnits::Table, PropertyUnits::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Active-window lookups per unit
        manager
            .create_index(
                Index::create()
                    .name("idx_proxies_unit_window")
                    .table(Proxies::Table)
                    .col(Proxies::PropertyUnitId)
                    .col(Proxies::StartDate)
                    .col(Proxies::EndDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Proxies::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PropertyUnits {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Proxies {
    Table,
    Id,
    PropertyUnitId,
    DelegateName,
    DelegateDocumentType,
    DelegateDocumentNumber,
    DelegateEmail,
    DelegatePhone,
    ProxyType,
    StartDate,
    EndDate,
    PowerOfAttorneyRef,
    IsActive,
    CreatedAt,
}
