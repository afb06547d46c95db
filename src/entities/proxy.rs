use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proxies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub property_unit_id: i64,
    pub delegate_name: String,
    pub delegate_document_type: Option<String>,
    pub delegate_document_number: String,
    pub delegate_email: Option<String>,
    pub delegate_phone: Option<String>,
    pub proxy_type: String, // general | specific
    pub start_date: DateTimeWithTimeZone,
    pub end_date: DateTimeWithTimeZone,
    pub power_of_attorney_ref: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::property_unit::Entity",
        from = "Column::PropertyUnitId",
        to = "super::property_unit::Column::Id"
    )]
    PropertyUnit,
}

impl Related<super::property_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PropertyUnit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
