use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub attendance_list_id: i64,
    pub property_unit_id: i64,
    pub attended_as_owner: bool,
    pub attended_as_proxy: bool,
    pub proxy_id: Option<i64>,
    pub signature: Option<String>,
    pub signature_method: Option<String>, // handwritten | digital | electronic
    pub signed_at: Option<DateTimeWithTimeZone>,
    pub is_valid: bool,
    pub notes: Option<String>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_list::Entity",
        from = "Column::AttendanceListId",
        to = "super::attendance_list::Column::Id"
    )]
    AttendanceList,
    #[sea_orm(
        belongs_to = "super::proxy::Entity",
        from = "Column::ProxyId",
        to = "super::proxy::Column::Id"
    )]
    Proxy,
}

impl Related<super::attendance_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceList.def()
    }
}

impl Related<super::proxy::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proxy.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
