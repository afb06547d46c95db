use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What attendance is measured in when evaluating quorum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumBasis {
    /// One unit, one share.
    #[default]
    Units,
    /// Units weighted by their participation coefficient.
    Weight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceList {
    pub id: i64,
    pub voting_group_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureMethod {
    Handwritten,
    Digital,
    Electronic,
}

impl SignatureMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureMethod::Handwritten => "handwritten",
            SignatureMethod::Digital => "digital",
            SignatureMethod::Electronic => "electronic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "handwritten" | "manual" => Some(SignatureMethod::Handwritten),
            "digital" => Some(SignatureMethod::Digital),
            "electronic" => Some(SignatureMethod::Electronic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub attendance_list_id: i64,
    pub property_unit_id: i64,
    pub attended_as_owner: bool,
    pub attended_as_proxy: bool,
    pub proxy_id: Option<i64>,
    pub signature: Option<String>,
    pub signature_method: Option<SignatureMethod>,
    pub signed_at: Option<DateTime<Utc>>,
    pub is_valid: bool,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn attended(&self) -> bool {
        self.is_valid && (self.attended_as_owner || self.attended_as_proxy)
    }
}

/// Values written by an attendance upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceUpdate {
    pub attendance_list_id: i64,
    pub property_unit_id: i64,
    pub attended_as_owner: bool,
    pub attended_as_proxy: bool,
    pub proxy_id: Option<i64>,
    pub signature: Option<String>,
    pub signature_method: Option<SignatureMethod>,
    pub signed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAttendance {
    pub property_unit_id: i64,
    #[serde(default)]
    pub attended_as_owner: bool,
    #[serde(default)]
    pub attended_as_proxy: bool,
    #[serde(default)]
    pub proxy_id: Option<i64>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub signature_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A list together with its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRoster {
    pub list: AttendanceList,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub attendance_list_id: i64,
    pub voting_group_id: i64,
    pub total_units: u64,
    pub attended_units: u64,
    pub attended_as_owner: u64,
    pub attended_as_proxy: u64,
    pub total_weight: Decimal,
    pub attended_weight: Decimal,
    pub attendance_percentage: Decimal,
    pub weight_percentage: Decimal,
    pub quorum_basis: QuorumBasis,
    pub requires_quorum: bool,
    pub quorum_percentage: Option<Decimal>,
    pub quorum_met: bool,
}

impl AttendanceSummary {
    /// Attendance share on the basis quorum is evaluated against.
    pub fn observed_percentage(&self) -> Decimal {
        match self.quorum_basis {
            QuorumBasis::Units => self.attendance_percentage,
            QuorumBasis::Weight => self.weight_percentage,
        }
    }

    /// Compares the exact attendance ratio with `required`; the rounded
    /// percentages are for display only.
    pub fn meets_quorum(&self, required: Decimal) -> bool {
        let (attended, total) = match self.quorum_basis {
            QuorumBasis::Units => (
                Decimal::from(self.attended_units),
                Decimal::from(self.total_units),
            ),
            QuorumBasis::Weight => (self.attended_weight, self.total_weight),
        };
        if total.is_zero() {
            return required.is_zero();
        }
        attended * Decimal::ONE_HUNDRED >= required * total
    }
}
