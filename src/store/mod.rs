//! Storage port for the assembly engine.
//!
//! The engine only talks to [`VotingStore`]; `PostgresStore` is the durable
//! adapter used in production and `MemoryStore` backs tests and the
//! `memory` backend.

use async_trait::async_trait;
use sea_orm::DbErr;

use crate::models::assembly::{
    NewVote, NewVoting, NewVotingGroup, NewVotingOption, Vote, Voting, VotingGroup, VotingOption,
};
use crate::models::attendance::{AttendanceList, AttendanceRecord, AttendanceUpdate};
use crate::models::property::{NewPropertyUnit, PropertyUnit};
use crate::models::proxy::{Proxy, ProxyDraft};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("stored value is invalid: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait VotingStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_property_unit(&self, unit: NewPropertyUnit)
    -> Result<PropertyUnit, StoreError>;
    async fn property_unit(&self, id: i64) -> Result<Option<PropertyUnit>, StoreError>;
    async fn property_units_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<PropertyUnit>, StoreError>;

    async fn insert_voting_group(&self, group: NewVotingGroup) -> Result<VotingGroup, StoreError>;
    async fn voting_group(&self, id: i64) -> Result<Option<VotingGroup>, StoreError>;
    async fn voting_groups_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<VotingGroup>, StoreError>;
    async fn set_voting_group_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<VotingGroup>, StoreError>;

    /// `required_percentage` is resolved by the caller before insertion.
    async fn insert_voting(&self, voting: NewVoting) -> Result<Voting, StoreError>;
    async fn voting(&self, id: i64) -> Result<Option<Voting>, StoreError>;
    async fn votings_for_group(&self, voting_group_id: i64) -> Result<Vec<Voting>, StoreError>;
    async fn set_voting_active(&self, id: i64, active: bool)
    -> Result<Option<Voting>, StoreError>;

    async fn insert_voting_option(
        &self,
        option: NewVotingOption,
    ) -> Result<VotingOption, StoreError>;
    async fn voting_option(&self, id: i64) -> Result<Option<VotingOption>, StoreError>;
    async fn voting_options(&self, voting_id: i64) -> Result<Vec<VotingOption>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the unit already voted.
    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, StoreError>;
    async fn vote_for_unit(
        &self,
        voting_id: i64,
        property_unit_id: i64,
    ) -> Result<Option<Vote>, StoreError>;
    /// Ordered by cast time, then id.
    async fn votes_for_voting(&self, voting_id: i64) -> Result<Vec<Vote>, StoreError>;
    async fn delete_vote(&self, id: i64) -> Result<Option<Vote>, StoreError>;

    async fn attendance_list_for_group(
        &self,
        voting_group_id: i64,
    ) -> Result<Option<AttendanceList>, StoreError>;
    async fn attendance_list(&self, id: i64) -> Result<Option<AttendanceList>, StoreError>;
    /// Creates the list and one default record per unit atomically.
    /// Fails with [`StoreError::Conflict`] when the group already has a list.
    async fn create_attendance_list(
        &self,
        voting_group_id: i64,
        property_unit_ids: &[i64],
    ) -> Result<AttendanceList, StoreError>;
    async fn attendance_records(
        &self,
        attendance_list_id: i64,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
    async fn attendance_record(
        &self,
        attendance_list_id: i64,
        property_unit_id: i64,
    ) -> Result<Option<AttendanceRecord>, StoreError>;
    async fn upsert_attendance_record(
        &self,
        update: AttendanceUpdate,
    ) -> Result<AttendanceRecord, StoreError>;

    async fn insert_proxy(&self, proxy: ProxyDraft) -> Result<Proxy, StoreError>;
    async fn proxy(&self, id: i64) -> Result<Option<Proxy>, StoreError>;
    /// Newest first.
    async fn proxies_for_unit(&self, property_unit_id: i64) -> Result<Vec<Proxy>, StoreError>;
    async fn set_proxy_active(&self, id: i64, active: bool) -> Result<Option<Proxy>, StoreError>;
}
