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
                    .table(AttendanceLists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AttendanceLists::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AttendanceLists::VotingGroupId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(AttendanceLists::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_lists_group")
                            .from(AttendanceLists::Table, AttendanceLists::VotingGroupId)
                            .to(VotingGroups::Table, VotingGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AttendanceRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AttendanceRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AttendanceRecords::AttendanceListId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AttendanceRecords::PropertyUnitId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AttendanceRecords::AttendedAsOwner)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AttendanceRecords::AttendedAsProxy)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(AttendanceRecords::ProxyId).big_integer())
                    .col(ColumnDef::new(AttendanceRecords::Signature).text())
                    .col(ColumnDef::new(AttendanceRecords::SignatureMethod).string_len(16))
                    .col(ColumnDef::new(AttendanceRecords::SignedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(AttendanceRecords::IsValid)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(AttendanceRecords::Notes).text())
                    .col(
                        ColumnDef::new(AttendanceRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_records_list")
                            .from(AttendanceRecords::Table, AttendanceRecords::AttendanceListId)
                            .to(AttendanceLists::Table, AttendanceLists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_records_unit")
                            .from(AttendanceRecords::Table, AttendanceRecords::PropertyUnitId)
                            .to(PropertyUnits::Table, PropertyUnits::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_records_proxy")
                            .from(AttendanceRecords::Table, AttendanceRecords::ProxyId)
                            .to(Proxies::Table, Proxies::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_attendance_records_list_unit")
                    .table(AttendanceRecords::Table)
                    .col(AttendanceRecords::AttendanceListId)
                    .col(AttendanceRecords::PropertyUnitId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AttendanceRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AttendanceLists::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum VotingGroups {
    Table,
    Id,
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
}

#[derive(DeriveIden)]
enum AttendanceLists {
    Table,
    Id,
    VotingGroupId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AttendanceRecords {
    Table,
    Id,
    AttendanceListId,
    PropertyUnitId,
    AttendedAsOwner,
    AttendedAsProxy,
    ProxyId,
    Signature,
    SignatureMethod,
    SignedAt,
    IsValid,
    Notes,
    UpdatedAt,
}
