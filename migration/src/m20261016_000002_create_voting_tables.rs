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
                    .table(VotingGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VotingGroups::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VotingGroups::BusinessId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VotingGroups::Name).string_len(128).not_null())
                    .col(ColumnDef::new(VotingGroups::Description).text())
                    .col(
                        ColumnDef::new(VotingGroups::VotingStartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VotingGroups::VotingEndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VotingGroups::RequiresQuorum)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(VotingGroups::QuorumPercentage).decimal_len(5, 2))
                    .col(
                        ColumnDef::new(VotingGroups::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(VotingGroups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_voting_groups_business")
                    .table(VotingGroups::Table)
                    .col(VotingGroups::BusinessId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Votings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Votings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Votings::VotingGroupId).big_integer().not_null())
                    .col(ColumnDef::new(Votings::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Votings::Description).text())
                    .col(ColumnDef::new(Votings::VotingType).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Votings::IsSecret)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Votings::AllowAbstention)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Votings::RequiredPercentage)
                            .decimal_len(5, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Votings::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Votings::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Votings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_votings_group")
                            .from(Votings::Table, Votings::VotingGroupId)
                            .to(VotingGroups::Table, VotingGroups::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VotingOptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VotingOptions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VotingOptions::VotingId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VotingOptions::Text).string_len(128).not_null())
                    .col(ColumnDef::new(VotingOptions::Code).string_len(32).not_null())
                    .col(ColumnDef::new(VotingOptions::Color).string_len(7))
                    .col(
                        ColumnDef::new(VotingOptions::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(VotingOptions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_voting_options_voting")
                            .from(VotingOptions::Table, VotingOptions::VotingId)
                            .to(Votings::Table, Votings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_voting_options_voting_code")
                    .table(VotingOptions::Table)
                    .col(VotingOptions::VotingId)
                    .col(VotingOptions::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Votes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Votes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Votes::VotingId).big_integer().not_null())
                    .col(ColumnDef::new(Votes::PropertyUnitId).big_integer().not_null())
                    .col(ColumnDef::new(Votes::VotingOptionId).big_integer().not_null())
                    .col(ColumnDef::new(Votes::CastByProxyId).big_integer())
                    .col(
                        ColumnDef::new(Votes::VotedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Votes::IpAddress)
                            .string_len(45) // IPv6 max length
                    )
                    .col(ColumnDef::new(Votes::UserAgent).string_len(512))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_votes_voting")
                            .from(Votes::Table, Votes::VotingId)
                            .to(Votings::Table, Votings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_votes_option")
                            .from(Votes::Table, Votes::VotingOptionId)
                            .to(VotingOptions::Table, VotingOptions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_votes_property_unit")
                            .from(Votes::Table, Votes::PropertyUnitId)
                            .to(PropertyUnits::Table, PropertyUnits::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // One ballot per unit per motion
        manager
            .create_index(
                Index::create()
                    .name("uq_votes_voting_unit")
                    .table(Votes::Table)
                    .col(Votes::VotingId)
                    .col(Votes::PropertyUnitId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Votes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VotingOptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Votings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VotingGroups::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PropertyUnits {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum VotingGroups {
    Table,
    Id,
    BusinessId,
    Name,
    Description,
    VotingStartDate,
    VotingEndDate,
    RequiresQuorum,
    QuorumPercentage,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Votings {
    Table,
    Id,
    VotingGroupId,
    Title,
    Description,
    VotingType,
    IsSecret,
    AllowAbstention,
    RequiredPercentage,
    DisplayOrder,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum VotingOptions {
    Table,
    Id,
    VotingId,
    Text,
    Code,
    Color,
    DisplayOrder,
    IsActive,
}

#[derive(DeriveIden)]
enum Votes {
    Table,
    Id,
    VotingId,
    PropertyUnitId,
    VotingOptionId,
    CastByProxyId,
    VotedAt,
    IpAddress,
    UserAgent,
}
