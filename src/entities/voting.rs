use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "votings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub voting_group_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub voting_type: String, // simple | majority | unanimity
    pub is_secret: bool,
    pub allow_abstention: bool,
    pub required_percentage: Decimal,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::voting_group::Entity",
        from = "Column::VotingGroupId",
        to = "super::voting_group::Column::Id"
    )]
    VotingGroup,
    #[sea_orm(has_many = "super::voting_option::Entity")]
    VotingOption,
    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
}

impl Related<super::voting_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingGroup.def()
    }
}

impl Related<super::voting_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingOption.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
