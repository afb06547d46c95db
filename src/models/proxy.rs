use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyType {
    General,
    Specific,
}

impl ProxyType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProxyType::General => "general",
            ProxyType::Specific => "specific",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Some(ProxyType::General),
            "specific" | "special" => Some(ProxyType::Specific),
            _ => None,
        }
    }
}

/// A delegation from a unit's owner to a named delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub id: i64,
    pub property_unit_id: i64,
    pub delegate_name: String,
    pub delegate_document_type: Option<String>,
    pub delegate_document_number: String,
    pub delegate_email: Option<String>,
    pub delegate_phone: Option<String>,
    pub proxy_type: ProxyType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub power_of_attorney_ref: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Proxy {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= at && at <= self.end_date
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProxy {
    pub property_unit_id: i64,
    pub delegate_name: String,
    #[serde(default)]
    pub delegate_document_type: Option<String>,
    #[serde(default)]
    pub delegate_document_number: Option<String>,
    #[serde(default)]
    pub delegate_email: Option<String>,
    #[serde(default)]
    pub delegate_phone: Option<String>,
    pub proxy_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub power_of_attorney_ref: Option<String>,
}

/// Normalized proxy ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDraft {
    pub property_unit_id: i64,
    pub delegate_name: String,
    pub delegate_document_type: Option<String>,
    pub delegate_document_number: String,
    pub delegate_email: Option<String>,
    pub delegate_phone: Option<String>,
    pub proxy_type: ProxyType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub power_of_attorney_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyValidation {
    pub proxy_id: i64,
    pub property_unit_id: i64,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
}
