use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PropertyUnits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PropertyUnits::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PropertyUnits::BusinessId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PropertyUnits::Code).string_len(128).not_null())
                    .col(
                        ColumnDef::new(PropertyUnits::OwnerName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PropertyUnits::ParticipationWeight)
                            .decimal_len(12, 6)
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(PropertyUnits::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_property_units_business_code")
                    .table(PropertyUnits::Table)
                    .col(PropertyUnits::BusinessId)
                    .col(PropertyUnits::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PropertyUnits::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PropertyUnits {
    Table,
    Id,
    BusinessId,
    Code,
    OwnerName,
    ParticipationWeight,
    IsActive,
}
