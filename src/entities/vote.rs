use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "votes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub voting_id: i64,
    pub property_unit_id: i64,
    pub voting_option_id: i64,
    pub cast_by_proxy_id: Option<i64>,
    pub voted_at: DateTimeWithTimeZone,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::voting::Entity",
        from = "Column::VotingId",
        to = "super::voting::Column::Id"
    )]
    Voting,
    #[sea_orm(
        belongs_to = "super::voting_option::Entity",
        from = "Column::VotingOptionId",
        to = "super::voting_option::Column::Id"
    )]
    VotingOption,
}

impl Related<super::voting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Voting.def()
    }
}

impl Related<super::voting_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
