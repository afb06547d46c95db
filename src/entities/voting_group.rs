use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "voting_groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub voting_start_date: DateTimeWithTimeZone,
    pub voting_end_date: DateTimeWithTimeZone,
    pub requires_quorum: bool,
    pub quorum_percentage: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::voting::Entity")]
    Voting,
    #[sea_orm(has_one = "super::attendance_list::Entity")]
    AttendanceList,
}

impl Related<super::voting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Voting.def()
    }
}

impl Related<super::attendance_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceList.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
