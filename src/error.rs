use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("{0}")]
    Validation(String),
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: i64 },
    #[error("property unit {property_unit_id} has already voted on voting {voting_id}")]
    AlreadyVoted {
        voting_id: i64,
        property_unit_id: i64,
    },
    #[error("property unit {property_unit_id} is not registered as present for voting group {voting_group_id}")]
    NotInAttendance {
        voting_group_id: i64,
        property_unit_id: i64,
    },
    #[error("{0}")]
    VotingClosed(String),
    #[error("{0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl AssemblyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: &'static str, id: i64) -> Self {
        Self::NotFound { resource, id }
    }
}
