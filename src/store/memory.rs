use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{StoreError, VotingStore};
use crate::models::assembly::{
    NewVote, NewVoting, NewVotingGroup, NewVotingOption, Vote, Voting, VotingGroup, VotingOption,
};
use crate::models::attendance::{AttendanceList, AttendanceRecord, AttendanceUpdate};
use crate::models::property::{NewPropertyUnit, PropertyUnit};
use crate::models::proxy::{Proxy, ProxyDraft};

#[derive(Default)]
struct Tables {
    units: BTreeMap<i64, PropertyUnit>,
    groups: BTreeMap<i64, VotingGroup>,
    votings: BTreeMap<i64, Voting>,
    options: BTreeMap<i64, VotingOption>,
    votes: BTreeMap<i64, Vote>,
    lists: BTreeMap<i64, AttendanceList>,
    records: BTreeMap<i64, AttendanceRecord>,
    proxies: BTreeMap<i64, Proxy>,
}

/// Process-local store with the same uniqueness rules as the schema.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    sequence: AtomicI64,
    #[cfg(test)]
    vote_reads: ReadGate,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            sequence: AtomicI64::new(1),
            #[cfg(test)]
            vote_reads: ReadGate::default(),
        }
    }

    fn next_id(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

/// Holds the next `votes_for_voting` call after it has read its rows, so
/// tests can interleave writes with an in-flight read.
#[cfg(test)]
#[derive(Default)]
struct ReadGate {
    armed: std::sync::atomic::AtomicBool,
    paused: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

#[cfg(test)]
impl ReadGate {
    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.paused.notify_one();
            self.release.notified().await;
        }
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn hold_next_vote_read(&self) {
        self.vote_reads.armed.store(true, Ordering::SeqCst);
    }

    pub async fn vote_read_held(&self) {
        self.vote_reads.paused.notified().await;
    }

    pub fn release_vote_read(&self) {
        self.vote_reads.release.notify_one();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VotingStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_property_unit(
        &self,
        unit: NewPropertyUnit,
    ) -> Result<PropertyUnit, StoreError> {
        let mut tables = self.tables.write();
        let duplicate = tables
            .units
            .values()
            .any(|existing| existing.business_id == unit.business_id && existing.code == unit.code);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "property unit {} already exists for business {}",
                unit.code, unit.business_id
            )));
        }
        let record = PropertyUnit {
            id: self.next_id(),
            business_id: unit.business_id,
            code: unit.code,
            owner_name: unit.owner_name,
            participation_weight: unit.participation_weight,
            is_active: true,
        };
        tables.units.insert(record.id, record.clone());
        Ok(record)
    }

    async fn property_unit(&self, id: i64) -> Result<Option<PropertyUnit>, StoreError> {
        Ok(self.tables.read().units.get(&id).cloned())
    }

    async fn property_units_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<PropertyUnit>, StoreError> {
        Ok(self
            .tables
            .read()
            .units
            .values()
            .filter(|unit| unit.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn insert_voting_group(&self, group: NewVotingGroup) -> Result<VotingGroup, StoreError> {
        let record = VotingGroup {
            id: self.next_id(),
            business_id: group.business_id,
            name: group.name,
            description: group.description,
            voting_start_date: group.voting_start_date,
            voting_end_date: group.voting_end_date,
            requires_quorum: group.requires_quorum,
            quorum_percentage: group.quorum_percentage,
            is_active: true,
            created_at: Utc::now(),
        };
        self.tables.write().groups.insert(record.id, record.clone());
        Ok(record)
    }

    async fn voting_group(&self, id: i64) -> Result<Option<VotingGroup>, StoreError> {
        Ok(self.tables.read().groups.get(&id).cloned())
    }

    async fn voting_groups_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<VotingGroup>, StoreError> {
        let mut groups = self
            .tables
            .read()
            .groups
            .values()
            .filter(|group| group.business_id == business_id)
            .cloned()
            .collect::<Vec<_>>();
        groups.sort_by(|a, b| b.voting_start_date.cmp(&a.voting_start_date));
        Ok(groups)
    }

    async fn set_voting_group_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<VotingGroup>, StoreError> {
        let mut tables = self.tables.write();
        Ok(tables.groups.get_mut(&id).map(|group| {
            group.is_active = active;
            group.clone()
        }))
    }

    async fn insert_voting(&self, voting: NewVoting) -> Result<Voting, StoreError> {
        let required_percentage = voting
            .required_percentage
            .unwrap_or_else(|| voting.voting_type.default_required_percentage());
        let record = Voting {
            id: self.next_id(),
            voting_group_id: voting.voting_group_id,
            title: voting.title,
            description: voting.description,
            voting_type: voting.voting_type,
            is_secret: voting.is_secret,
            allow_abstention: voting.allow_abstention,
            required_percentage,
            display_order: voting.display_order,
            is_active: true,
            created_at: Utc::now(),
        };
        self.tables.write().votings.insert(record.id, record.clone());
        Ok(record)
    }

    async fn voting(&self, id: i64) -> Result<Option<Voting>, StoreError> {
        Ok(self.tables.read().votings.get(&id).cloned())
    }

    async fn votings_for_group(&self, voting_group_id: i64) -> Result<Vec<Voting>, StoreError> {
        let mut votings = self
            .tables
            .read()
            .votings
            .values()
            .filter(|voting| voting.voting_group_id == voting_group_id)
            .cloned()
            .collect::<Vec<_>>();
        votings.sort_by_key(|voting| (voting.display_order, voting.id));
        Ok(votings)
    }

    async fn set_voting_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<Voting>, StoreError> {
        let mut tables = self.tables.write();
        Ok(tables.votings.get_mut(&id).map(|voting| {
            voting.is_active = active;
            voting.clone()
        }))
    }

    async fn insert_voting_option(
        &self,
        option: NewVotingOption,
    ) -> Result<VotingOption, StoreError> {
        let mut tables = self.tables.write();
        let duplicate = tables
            .options
            .values()
            .any(|existing| existing.voting_id == option.voting_id && existing.code == option.code);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "option code {} already exists for voting {}",
                option.code, option.voting_id
            )));
        }
        let record = VotingOption {
            id: self.next_id(),
            voting_id: option.voting_id,
            text: option.text,
            code: option.code,
            color: option.color,
            display_order: option.display_order,
            is_active: true,
        };
        tables.options.insert(record.id, record.clone());
        Ok(record)
    }

    async fn voting_option(&self, id: i64) -> Result<Option<VotingOption>, StoreError> {
        Ok(self.tables.read().options.get(&id).cloned())
    }

    async fn voting_options(&self, voting_id: i64) -> Result<Vec<VotingOption>, StoreError> {
        let mut options = self
            .tables
            .read()
            .options
            .values()
            .filter(|option| option.voting_id == voting_id)
            .cloned()
            .collect::<Vec<_>>();
        options.sort_by_key(|option| (option.display_order, option.id));
        Ok(options)
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        let mut tables = self.tables.write();
        let duplicate = tables.votes.values().any(|existing| {
            existing.voting_id == vote.voting_id
                && existing.property_unit_id == vote.property_unit_id
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "property unit {} already voted on voting {}",
                vote.property_unit_id, vote.voting_id
            )));
        }
        let record = Vote {
            id: self.next_id(),
            voting_id: vote.voting_id,
            property_unit_id: vote.property_unit_id,
            voting_option_id: vote.voting_option_id,
            cast_by_proxy_id: vote.cast_by_proxy_id,
            voted_at: vote.voted_at,
            ip_address: vote.ip_address,
            user_agent: vote.user_agent,
        };
        tables.votes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn vote_for_unit(
        &self,
        voting_id: i64,
        property_unit_id: i64,
    ) -> Result<Option<Vote>, StoreError> {
        Ok(self
            .tables
            .read()
            .votes
            .values()
            .find(|vote| vote.voting_id == voting_id && vote.property_unit_id == property_unit_id)
            .cloned())
    }

    async fn votes_for_voting(&self, voting_id: i64) -> Result<Vec<Vote>, StoreError> {
        let mut votes = self
            .tables
            .read()
            .votes
            .values()
            .filter(|vote| vote.voting_id == voting_id)
            .cloned()
            .collect::<Vec<_>>();
        votes.sort_by_key(|vote| (vote.voted_at, vote.id));
        #[cfg(test)]
        self.vote_reads.pass().await;
        Ok(votes)
    }

    async fn delete_vote(&self, id: i64) -> Result<Option<Vote>, StoreError> {
        Ok(self.tables.write().votes.remove(&id))
    }

    async fn attendance_list_for_group(
        &self,
        voting_group_id: i64,
    ) -> Result<Option<AttendanceList>, StoreError> {
        Ok(self
            .tables
            .read()
            .lists
            .values()
            .find(|list| list.voting_group_id == voting_group_id)
            .cloned())
    }

    async fn attendance_list(&self, id: i64) -> Result<Option<AttendanceList>, StoreError> {
        Ok(self.tables.read().lists.get(&id).cloned())
    }

    async fn create_attendance_list(
        &self,
        voting_group_id: i64,
        property_unit_ids: &[i64],
    ) -> Result<AttendanceList, StoreError> {
        let mut tables = self.tables.write();
        if tables
            .lists
            .values()
            .any(|list| list.voting_group_id == voting_group_id)
        {
            return Err(StoreError::Conflict(format!(
                "attendance list already exists for voting group {voting_group_id}"
            )));
        }

        let now = Utc::now();
        let list = AttendanceList {
            id: self.next_id(),
            voting_group_id,
            created_at: now,
        };
        tables.lists.insert(list.id, list.clone());

        for &property_unit_id in property_unit_ids {
            let record = AttendanceRecord {
                id: self.next_id(),
                attendance_list_id: list.id,
                property_unit_id,
                attended_as_owner: false,
                attended_as_proxy: false,
                proxy_id: None,
                signature: None,
                signature_method: None,
                signed_at: None,
                is_valid: true,
                notes: None,
                updated_at: now,
            };
            tables.records.insert(record.id, record);
        }

        Ok(list)
    }

    async fn attendance_records(
        &self,
        attendance_list_id: i64,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .records
            .values()
            .filter(|record| record.attendance_list_id == attendance_list_id)
            .cloned()
            .collect())
    }

    async fn attendance_record(
        &self,
        attendance_list_id: i64,
        property_unit_id: i64,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .records
            .values()
            .find(|record| {
                record.attendance_list_id == attendance_list_id
                    && record.property_unit_id == property_unit_id
            })
            .cloned())
    }

    async fn upsert_attendance_record(
        &self,
        update: AttendanceUpdate,
    ) -> Result<AttendanceRecord, StoreError> {
        let mut tables = self.tables.write();
        let existing = tables.records.values_mut().find(|record| {
            record.attendance_list_id == update.attendance_list_id
                && record.property_unit_id == update.property_unit_id
        });

        if let Some(record) = existing {
            record.attended_as_owner = update.attended_as_owner;
            record.attended_as_proxy = update.attended_as_proxy;
            record.proxy_id = update.proxy_id;
            record.signature = update.signature;
            record.signature_method = update.signature_method;
            record.signed_at = update.signed_at;
            record.notes = update.notes;
            record.updated_at = update.updated_at;
            return Ok(record.clone());
        }

        let record = AttendanceRecord {
            id: self.next_id(),
            attendance_list_id: update.attendance_list_id,
            property_unit_id: update.property_unit_id,
            attended_as_owner: update.attended_as_owner,
            attended_as_proxy: update.attended_as_proxy,
            proxy_id: update.proxy_id,
            signature: update.signature,
            signature_method: update.signature_method,
            signed_at: update.signed_at,
            is_valid: true,
            notes: update.notes,
            updated_at: update.updated_at,
        };
        tables.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_proxy(&self, proxy: ProxyDraft) -> Result<Proxy, StoreError> {
        let record = Proxy {
            id: self.next_id(),
            property_unit_id: proxy.property_unit_id,
            delegate_name: proxy.delegate_name,
            delegate_document_type: proxy.delegate_document_type,
            delegate_document_number: proxy.delegate_document_number,
            delegate_email: proxy.delegate_email,
            delegate_phone: proxy.delegate_phone,
            proxy_type: proxy.proxy_type,
            start_date: proxy.start_date,
            end_date: proxy.end_date,
            power_of_attorney_ref: proxy.power_of_attorney_ref,
            is_active: true,
            created_at: proxy.created_at,
        };
        self.tables.write().proxies.insert(record.id, record.clone());
        Ok(record)
    }

    async fn proxy(&self, id: i64) -> Result<Option<Proxy>, StoreError> {
        Ok(self.tables.read().proxies.get(&id).cloned())
    }

    async fn proxies_for_unit(&self, property_unit_id: i64) -> Result<Vec<Proxy>, StoreError> {
        let mut proxies = self
            .tables
            .read()
            .proxies
            .values()
            .filter(|proxy| proxy.property_unit_id == property_unit_id)
            .cloned()
            .collect::<Vec<_>>();
        proxies.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        Ok(proxies)
    }

    async fn set_proxy_active(&self, id: i64, active: bool) -> Result<Option<Proxy>, StoreError> {
        let mut tables = self.tables.write();
        Ok(tables.proxies.get_mut(&id).map(|proxy| {
            proxy.is_active = active;
            proxy.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn unit(business_id: i64, code: &str) -> NewPropertyUnit {
        NewPropertyUnit {
            business_id,
            code: code.to_string(),
            owner_name: format!("Owner {code}"),
            participation_weight: Decimal::ONE,
        }
    }

    #[tokio::test]
    async fn duplicate_vote_is_a_conflict() {
        let store = MemoryStore::new();
        let vote = NewVote {
            voting_id: 10,
            property_unit_id: 20,
            voting_option_id: 30,
            cast_by_proxy_id: None,
            voted_at: Utc::now(),
            ip_address: None,
            user_agent: None,
        };
        store.insert_vote(vote.clone()).await.expect("first vote stored");
        let err = store.insert_vote(vote).await.expect_err("second vote rejected");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.votes_for_voting(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn attendance_list_is_unique_per_group() {
        let store = MemoryStore::new();
        let a = store.insert_property_unit(unit(1, "A-101")).await.unwrap();
        let b = store.insert_property_unit(unit(1, "A-102")).await.unwrap();

        let list = store
            .create_attendance_list(7, &[a.id, b.id])
            .await
            .expect("list created");
        assert_eq!(store.attendance_records(list.id).await.unwrap().len(), 2);

        let err = store
            .create_attendance_list(7, &[a.id])
            .await
            .expect_err("duplicate list rejected");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.attendance_records(list.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_record() {
        let store = MemoryStore::new();
        let a = store.insert_property_unit(unit(1, "A-101")).await.unwrap();
        let list = store.create_attendance_list(3, &[a.id]).await.unwrap();

        let now = Utc::now();
        let updated = store
            .upsert_attendance_record(AttendanceUpdate {
                attendance_list_id: list.id,
                property_unit_id: a.id,
                attended_as_owner: true,
                attended_as_proxy: false,
                proxy_id: None,
                signature: Some("deadbeef".to_string()),
                signature_method: None,
                signed_at: Some(now),
                notes: None,
                updated_at: now,
            })
            .await
            .unwrap();

        assert!(updated.attended_as_owner);
        let records = store.attendance_records(list.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, updated.id);
    }

    #[tokio::test]
    async fn duplicate_unit_code_within_business_rejected() {
        let store = MemoryStore::new();
        store.insert_property_unit(unit(1, "A-101")).await.unwrap();
        assert!(store.insert_property_unit(unit(2, "A-101")).await.is_ok());
        assert!(matches!(
            store.insert_property_unit(unit(1, "A-101")).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
