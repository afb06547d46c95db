use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const AFFIRMATIVE_CODES: [&str; 5] = ["yes", "si", "for", "approve", "favor"];
const ABSTENTION_CODES: [&str; 3] = ["abstain", "abstention", "blank"];

/// A governance session (assembly) scoped to one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingGroup {
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub voting_start_date: DateTime<Utc>,
    pub voting_end_date: DateTime<Utc>,
    pub requires_quorum: bool,
    pub quorum_percentage: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl VotingGroup {
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.voting_start_date <= at && at <= self.voting_end_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVotingGroup {
    pub business_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub voting_start_date: DateTime<Utc>,
    pub voting_end_date: DateTime<Utc>,
    #[serde(default)]
    pub requires_quorum: bool,
    #[serde(default)]
    pub quorum_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingType {
    Simple,
    Majority,
    Unanimity,
}

impl VotingType {
    pub fn as_str(self) -> &'static str {
        match self {
            VotingType::Simple => "simple",
            VotingType::Majority => "majority",
            VotingType::Unanimity => "unanimity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(VotingType::Simple),
            "majority" | "qualified_majority" => Some(VotingType::Majority),
            "unanimity" | "unanimous" => Some(VotingType::Unanimity),
            _ => None,
        }
    }

    /// Threshold applied when a motion is created without one.
    pub fn default_required_percentage(self) -> Decimal {
        match self {
            VotingType::Simple => Decimal::from(50),
            VotingType::Majority => Decimal::new(6667, 2),
            VotingType::Unanimity => Decimal::ONE_HUNDRED,
        }
    }
}

/// A motion put to a vote inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voting {
    pub id: i64,
    pub voting_group_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub voting_type: VotingType,
    pub is_secret: bool,
    pub allow_abstention: bool,
    pub required_percentage: Decimal,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVoting {
    pub voting_group_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub voting_type: VotingType,
    pub is_secret: bool,
    pub allow_abstention: bool,
    pub required_percentage: Option<Decimal>,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingOption {
    pub id: i64,
    pub voting_id: i64,
    pub text: String,
    pub code: String,
    pub color: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
}

impl VotingOption {
    pub fn is_affirmative(&self) -> bool {
        AFFIRMATIVE_CODES.contains(&self.code.as_str())
    }

    pub fn is_abstention(&self) -> bool {
        is_abstention_code(&self.code)
    }
}

pub fn normalize_option_code(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

pub fn is_abstention_code(code: &str) -> bool {
    ABSTENTION_CODES.contains(&code)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVotingOption {
    pub voting_id: i64,
    pub text: String,
    pub code: String,
    pub color: Option<String>,
    pub display_order: i32,
}

/// One ballot cast by one property unit for one motion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub voting_id: i64,
    pub property_unit_id: i64,
    pub voting_option_id: i64,
    pub cast_by_proxy_id: Option<i64>,
    pub voted_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVote {
    pub voting_id: i64,
    pub property_unit_id: i64,
    pub voting_option_id: i64,
    pub cast_by_proxy_id: Option<i64>,
    pub voted_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Audit metadata captured from the request that carried the ballot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastVote {
    pub voting_id: i64,
    pub property_unit_id: i64,
    pub voting_option_id: i64,
    pub proxy_id: Option<i64>,
    pub metadata: VoteMetadata,
}

/// A vote enriched with its option's display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteView {
    pub vote_id: i64,
    pub voting_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_unit_id: Option<i64>,
    pub voting_option_id: i64,
    pub option_text: String,
    pub option_code: String,
    pub option_color: Option<String>,
    pub cast_by_proxy: bool,
    pub voted_at: DateTime<Utc>,
}

impl VoteView {
    pub fn from_parts(vote: &Vote, option: &VotingOption) -> Self {
        Self {
            vote_id: vote.id,
            voting_id: vote.voting_id,
            property_unit_id: Some(vote.property_unit_id),
            voting_option_id: option.id,
            option_text: option.text.clone(),
            option_code: option.code.clone(),
            option_color: option.color.clone(),
            cast_by_proxy: vote.cast_by_proxy_id.is_some(),
            voted_at: vote.voted_at,
        }
    }

    /// Strips the voter's identity for secret motions.
    pub fn redacted(mut self) -> Self {
        self.property_unit_id = None;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingOutcome {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub option_id: i64,
    pub code: String,
    pub text: String,
    pub color: Option<String>,
    pub votes: u64,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumStatus {
    pub required_percentage: Decimal,
    pub attendance_percentage: Decimal,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingResults {
    pub voting_id: i64,
    pub voting_type: VotingType,
    pub required_percentage: Decimal,
    pub total_votes: u64,
    pub counted_votes: u64,
    pub abstentions: u64,
    pub options: Vec<OptionTally>,
    pub affirmative_percentage: Decimal,
    pub outcome: VotingOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quorum: Option<QuorumStatus>,
}

// Request types for the HTTP API

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVotingRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub voting_type: String,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default = "default_allow_abstention")]
    pub allow_abstention: bool,
    #[serde(default)]
    pub required_percentage: Option<Decimal>,
    #[serde(default)]
    pub display_order: i32,
}

const fn default_allow_abstention() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVotingOptionRequest {
    pub text: String,
    pub code: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub property_unit_id: i64,
    pub voting_option_id: i64,
    #[serde(default)]
    pub proxy_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voting_type_parsing_accepts_aliases() {
        assert_eq!(VotingType::parse(" Majority "), Some(VotingType::Majority));
        assert_eq!(VotingType::parse("unanimous"), Some(VotingType::Unanimity));
        assert_eq!(VotingType::parse("ranked"), None);
    }

    #[test]
    fn option_codes_classify_affirmative_and_abstention() {
        let option = VotingOption {
            id: 1,
            voting_id: 1,
            text: "Sí".to_string(),
            code: normalize_option_code(" SI "),
            color: None,
            display_order: 0,
            is_active: true,
        };
        assert!(option.is_affirmative());
        assert!(!option.is_abstention());
        assert!(is_abstention_code(&normalize_option_code("Blank")));
    }
}
