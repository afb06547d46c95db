use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A condominium unit; the atomic voting entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyUnit {
    pub id: i64,
    pub business_id: i64,
    pub code: String,
    pub owner_name: String,
    /// Co-ownership coefficient used for weighted quorum.
    pub participation_weight: Decimal,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPropertyUnit {
    pub business_id: i64,
    pub code: String,
    pub owner_name: String,
    pub participation_weight: Decimal,
}
