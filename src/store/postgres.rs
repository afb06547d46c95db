use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};

use super::{StoreError, VotingStore};
use crate::entities::{
    attendance_list, attendance_record, property_unit, proxy, vote, voting, voting_group,
    voting_option,
};
use crate::models::assembly::{
    NewVote, NewVoting, NewVotingGroup, NewVotingOption, Vote, Voting, VotingGroup, VotingOption,
    VotingType,
};
use crate::models::attendance::{
    AttendanceList, AttendanceRecord, AttendanceUpdate, SignatureMethod,
};
use crate::models::property::{NewPropertyUnit, PropertyUnit};
use crate::models::proxy::{Proxy, ProxyDraft, ProxyType};

/// sea-orm adapter over the PostgreSQL schema created by the `migration` crate.
#[derive(Clone)]
pub struct PostgresStore {
    database: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

fn map_db_error(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Conflict(detail),
        _ => StoreError::Database(err),
    }
}

fn to_utc(value: DateTime<FixedOffset>) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

fn to_db(value: DateTime<Utc>) -> DateTime<FixedOffset> {
    value.fixed_offset()
}

impl From<property_unit::Model> for PropertyUnit {
    fn from(model: property_unit::Model) -> Self {
        Self {
            id: model.id,
            business_id: model.business_id,
            code: model.code,
            owner_name: model.owner_name,
            participation_weight: model.participation_weight,
            is_active: model.is_active,
        }
    }
}

impl From<voting_group::Model> for VotingGroup {
    fn from(model: voting_group::Model) -> Self {
        Self {
            id: model.id,
            business_id: model.business_id,
            name: model.name,
            description: model.description,
            voting_start_date: to_utc(model.voting_start_date),
            voting_end_date: to_utc(model.voting_end_date),
            requires_quorum: model.requires_quorum,
            quorum_percentage: model.quorum_percentage,
            is_active: model.is_active,
            created_at: to_utc(model.created_at),
        }
    }
}

impl TryFrom<voting::Model> for Voting {
    type Error = StoreError;

    fn try_from(model: voting::Model) -> Result<Self, Self::Error> {
        let voting_type = VotingType::parse(&model.voting_type).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "voting {} has unknown type {}",
                model.id, model.voting_type
            ))
        })?;
        Ok(Self {
            id: model.id,
            voting_group_id: model.voting_group_id,
            title: model.title,
            description: model.description,
            voting_type,
            is_secret: model.is_secret,
            allow_abstention: model.allow_abstention,
            required_percentage: model.required_percentage,
            display_order: model.display_order,
            is_active: model.is_active,
            created_at: to_utc(model.created_at),
        })
    }
}

impl From<voting_option::Model> for VotingOption {
    fn from(model: voting_option::Model) -> Self {
        Self {
            id: model.id,
            voting_id: model.voting_id,
            text: model.text,
            code: model.code,
            color: model.color,
            display_order: model.display_order,
            is_active: model.is_active,
        }
    }
}

impl From<vote::Model> for Vote {
    fn from(model: vote::Model) -> Self {
        Self {
            id: model.id,
            voting_id: model.voting_id,
            property_unit_id: model.property_unit_id,
            voting_option_id: model.voting_option_id,
            cast_by_proxy_id: model.cast_by_proxy_id,
            voted_at: to_utc(model.voted_at),
            ip_address: model.ip_address,
            user_agent: model.user_agent,
        }
    }
}

impl From<attendance_list::Model> for AttendanceList {
    fn from(model: attendance_list::Model) -> Self {
        Self {
            id: model.id,
            voting_group_id: model.voting_group_id,
            created_at: to_utc(model.created_at),
        }
    }
}

impl TryFrom<attendance_record::Model> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(model: attendance_record::Model) -> Result<Self, Self::Error> {
        let signature_method = match model.signature_method.as_deref() {
            Some(raw) => Some(SignatureMethod::parse(raw).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "attendance record {} has unknown signature method {raw}",
                    model.id
                ))
            })?),
            None => None,
        };
        Ok(Self {
            id: model.id,
            attendance_list_id: model.attendance_list_id,
            property_unit_id: model.property_unit_id,
            attended_as_owner: model.attended_as_owner,
            attended_as_proxy: model.attended_as_proxy,
            proxy_id: model.proxy_id,
            signature: model.signature,
            signature_method,
            signed_at: model.signed_at.map(to_utc),
            is_valid: model.is_valid,
            notes: model.notes,
            updated_at: to_utc(model.updated_at),
        })
    }
}

impl TryFrom<proxy::Model> for Proxy {
    type Error = StoreError;

    fn try_from(model: proxy::Model) -> Result<Self, Self::Error> {
        let proxy_type = ProxyType::parse(&model.proxy_type).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "proxy {} has unknown type {}",
                model.id, model.proxy_type
            ))
        })?;
        Ok(Self {
            id: model.id,
            property_unit_id: model.property_unit_id,
            delegate_name: model.delegate_name,
            delegate_document_type: model.delegate_document_type,
            delegate_document_number: model.delegate_document_number,
            delegate_email: model.delegate_email,
            delegate_phone: model.delegate_phone,
            proxy_type,
            start_date: to_utc(model.start_date),
            end_date: to_utc(model.end_date),
            power_of_attorney_ref: model.power_of_attorney_ref,
            is_active: model.is_active,
            created_at: to_utc(model.created_at),
        })
    }
}

#[async_trait]
impl VotingStore for PostgresStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.database.ping().await.map_err(map_db_error)
    }

    async fn insert_property_unit(
        &self,
        unit: NewPropertyUnit,
    ) -> Result<PropertyUnit, StoreError> {
        let model = property_unit::ActiveModel {
            id: NotSet,
            business_id: Set(unit.business_id),
            code: Set(unit.code),
            owner_name: Set(unit.owner_name),
            participation_weight: Set(unit.participation_weight),
            is_active: Set(true),
        }
        .insert(&self.database)
        .await
        .map_err(map_db_error)?;
        Ok(model.into())
    }

    async fn property_unit(&self, id: i64) -> Result<Option<PropertyUnit>, StoreError> {
        let model = property_unit::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(model.map(Into::into))
    }

    async fn property_units_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<PropertyUnit>, StoreError> {
        let models = property_unit::Entity::find()
            .filter(property_unit::Column::BusinessId.eq(business_id))
            .order_by_asc(property_unit::Column::Code)
            .all(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_voting_group(&self, group: NewVotingGroup) -> Result<VotingGroup, StoreError> {
        let model = voting_group::ActiveModel {
            id: NotSet,
            business_id: Set(group.business_id),
            name: Set(group.name),
            description: Set(group.description),
            voting_start_date: Set(to_db(group.voting_start_date)),
            voting_end_date: Set(to_db(group.voting_end_date)),
            requires_quorum: Set(group.requires_quorum),
            quorum_percentage: Set(group.quorum_percentage),
            is_active: Set(true),
            created_at: Set(to_db(Utc::now())),
        }
        .insert(&self.database)
        .await
        .map_err(map_db_error)?;
        Ok(model.into())
    }

    async fn voting_group(&self, id: i64) -> Result<Option<VotingGroup>, StoreError> {
        let model = voting_group::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(model.map(Into::into))
    }

    async fn voting_groups_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<VotingGroup>, StoreError> {
        let models = voting_group::Entity::find()
            .filter(voting_group::Column::BusinessId.eq(business_id))
            .order_by_desc(voting_group::Column::VotingStartDate)
            .all(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn set_voting_group_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<VotingGroup>, StoreError> {
        let Some(model) = voting_group::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?
        else {
            return Ok(None);
        };
        let mut model = model.into_active_model();
        model.is_active = Set(active);
        let updated = model.update(&self.database).await.map_err(map_db_error)?;
        Ok(Some(updated.into()))
    }

    async fn insert_voting(&self, voting: NewVoting) -> Result<Voting, StoreError> {
        let required_percentage = voting
            .required_percentage
            .unwrap_or_else(|| voting.voting_type.default_required_percentage());
        let model = voting::ActiveModel {
            id: NotSet,
            voting_group_id: Set(voting.voting_group_id),
            title: Set(voting.title),
            description: Set(voting.description),
            voting_type: Set(voting.voting_type.as_str().to_string()),
            is_secret: Set(voting.is_secret),
            allow_abstention: Set(voting.allow_abstention),
            required_percentage: Set(required_percentage),
            display_order: Set(voting.display_order),
            is_active: Set(true),
            created_at: Set(to_db(Utc::now())),
        }
        .insert(&self.database)
        .await
        .map_err(map_db_error)?;
        Voting::try_from(model)
    }

    async fn voting(&self, id: i64) -> Result<Option<Voting>, StoreError> {
        voting::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?
            .map(Voting::try_from)
            .transpose()
    }

    async fn votings_for_group(&self, voting_group_id: i64) -> Result<Vec<Voting>, StoreError> {
        voting::Entity::find()
            .filter(voting::Column::VotingGroupId.eq(voting_group_id))
            .order_by_asc(voting::Column::DisplayOrder)
            .order_by_asc(voting::Column::Id)
            .all(&self.database)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(Voting::try_from)
            .collect()
    }

    async fn set_voting_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<Voting>, StoreError> {
        let Some(model) = voting::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?
        else {
            return Ok(None);
        };
        let mut model = model.into_active_model();
        model.is_active = Set(active);
        let updated = model.update(&self.database).await.map_err(map_db_error)?;
        Voting::try_from(updated).map(Some)
    }

    async fn insert_voting_option(
        &self,
        option: NewVotingOption,
    ) -> Result<VotingOption, StoreError> {
        let model = voting_option::ActiveModel {
            id: NotSet,
            voting_id: Set(option.voting_id),
            text: Set(option.text),
            code: Set(option.code),
            color: Set(option.color),
            display_order: Set(option.display_order),
            is_active: Set(true),
        }
        .insert(&self.database)
        .await
        .map_err(map_db_error)?;
        Ok(model.into())
    }

    async fn voting_option(&self, id: i64) -> Result<Option<VotingOption>, StoreError> {
        let model = voting_option::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(model.map(Into::into))
    }

    async fn voting_options(&self, voting_id: i64) -> Result<Vec<VotingOption>, StoreError> {
        let models = voting_option::Entity::find()
            .filter(voting_option::Column::VotingId.eq(voting_id))
            .order_by_asc(voting_option::Column::DisplayOrder)
            .order_by_asc(voting_option::Column::Id)
            .all(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_vote(&self, new_vote: NewVote) -> Result<Vote, StoreError> {
        let model = vote::ActiveModel {
            id: NotSet,
            voting_id: Set(new_vote.voting_id),
            property_unit_id: Set(new_vote.property_unit_id),
            voting_option_id: Set(new_vote.voting_option_id),
            cast_by_proxy_id: Set(new_vote.cast_by_proxy_id),
            voted_at: Set(to_db(new_vote.voted_at)),
            ip_address: Set(new_vote.ip_address),
            user_agent: Set(new_vote.user_agent),
        }
        .insert(&self.database)
        .await
        .map_err(map_db_error)?;
        Ok(model.into())
    }

    async fn vote_for_unit(
        &self,
        voting_id: i64,
        property_unit_id: i64,
    ) -> Result<Option<Vote>, StoreError> {
        let model = vote::Entity::find()
            .filter(vote::Column::VotingId.eq(voting_id))
            .filter(vote::Column::PropertyUnitId.eq(property_unit_id))
            .one(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(model.map(Into::into))
    }

    async fn votes_for_voting(&self, voting_id: i64) -> Result<Vec<Vote>, StoreError> {
        let models = vote::Entity::find()
            .filter(vote::Column::VotingId.eq(voting_id))
            .order_by_asc(vote::Column::VotedAt)
            .order_by_asc(vote::Column::Id)
            .all(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn delete_vote(&self, id: i64) -> Result<Option<Vote>, StoreError> {
        let Some(model) = vote::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?
        else {
            return Ok(None);
        };
        vote::Entity::delete_by_id(id)
            .exec(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(Some(model.into()))
    }

    async fn attendance_list_for_group(
        &self,
        voting_group_id: i64,
    ) -> Result<Option<AttendanceList>, StoreError> {
        let model = attendance_list::Entity::find()
            .filter(attendance_list::Column::VotingGroupId.eq(voting_group_id))
            .one(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(model.map(Into::into))
    }

    async fn attendance_list(&self, id: i64) -> Result<Option<AttendanceList>, StoreError> {
        let model = attendance_list::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?;
        Ok(model.map(Into::into))
    }

    async fn create_attendance_list(
        &self,
        voting_group_id: i64,
        property_unit_ids: &[i64],
    ) -> Result<AttendanceList, StoreError> {
        let now = to_db(Utc::now());
        let txn = self.database.begin().await.map_err(map_db_error)?;

        let list = attendance_list::ActiveModel {
            id: NotSet,
            voting_group_id: Set(voting_group_id),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(map_db_error)?;

        if !property_unit_ids.is_empty() {
            let records = property_unit_ids
                .iter()
                .map(|&property_unit_id| attendance_record::ActiveModel {
                    id: NotSet,
                    attendance_list_id: Set(list.id),
                    property_unit_id: Set(property_unit_id),
                    attended_as_owner: Set(false),
                    attended_as_proxy: Set(false),
                    proxy_id: Set(None),
                    signature: Set(None),
                    signature_method: Set(None),
                    signed_at: Set(None),
                    is_valid: Set(true),
                    notes: Set(None),
                    updated_at: Set(now),
                })
                .collect::<Vec<_>>();
            attendance_record::Entity::insert_many(records)
                .exec(&txn)
                .await
                .map_err(map_db_error)?;
        }

        txn.commit().await.map_err(map_db_error)?;
        Ok(list.into())
    }

    async fn attendance_records(
        &self,
        attendance_list_id: i64,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        attendance_record::Entity::find()
            .filter(attendance_record::Column::AttendanceListId.eq(attendance_list_id))
            .order_by_asc(attendance_record::Column::Id)
            .all(&self.database)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect()
    }

    async fn attendance_record(
        &self,
        attendance_list_id: i64,
        property_unit_id: i64,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        attendance_record::Entity::find()
            .filter(attendance_record::Column::AttendanceListId.eq(attendance_list_id))
            .filter(attendance_record::Column::PropertyUnitId.eq(property_unit_id))
            .one(&self.database)
            .await
            .map_err(map_db_error)?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn upsert_attendance_record(
        &self,
        update: AttendanceUpdate,
    ) -> Result<AttendanceRecord, StoreError> {
        let existing = attendance_record::Entity::find()
            .filter(attendance_record::Column::AttendanceListId.eq(update.attendance_list_id))
            .filter(attendance_record::Column::PropertyUnitId.eq(update.property_unit_id))
            .one(&self.database)
            .await
            .map_err(map_db_error)?;

        let signature_method = update
            .signature_method
            .map(|method| method.as_str().to_string());

        let saved = match existing {
            Some(model) => {
                let mut model = model.into_active_model();
                model.attended_as_owner = Set(update.attended_as_owner);
                model.attended_as_proxy = Set(update.attended_as_proxy);
                model.proxy_id = Set(update.proxy_id);
                model.signature = Set(update.signature);
                model.signature_method = Set(signature_method);
                model.signed_at = Set(update.signed_at.map(to_db));
                model.notes = Set(update.notes);
                model.updated_at = Set(to_db(update.updated_at));
                model.update(&self.database).await
            }
            None => {
                attendance_record::ActiveModel {
                    id: NotSet,
                    attendance_list_id: Set(update.attendance_list_id),
                    property_unit_id: Set(update.property_unit_id),
                    attended_as_owner: Set(update.attended_as_owner),
                    attended_as_proxy: Set(update.attended_as_proxy),
                    proxy_id: Set(update.proxy_id),
                    signature: Set(update.signature),
                    signature_method: Set(signature_method),
                    signed_at: Set(update.signed_at.map(to_db)),
                    is_valid: Set(true),
                    notes: Set(update.notes),
                    updated_at: Set(to_db(update.updated_at)),
                }
                .insert(&self.database)
                .await
            }
        }
        .map_err(map_db_error)?;

        AttendanceRecord::try_from(saved)
    }

    async fn insert_proxy(&self, draft: ProxyDraft) -> Result<Proxy, StoreError> {
        let model = proxy::ActiveModel {
            id: NotSet,
            property_unit_id: Set(draft.property_unit_id),
            delegate_name: Set(draft.delegate_name),
            delegate_document_type: Set(draft.delegate_document_type),
            delegate_document_number: Set(draft.delegate_document_number),
            delegate_email: Set(draft.delegate_email),
            delegate_phone: Set(draft.delegate_phone),
            proxy_type: Set(draft.proxy_type.as_str().to_string()),
            start_date: Set(to_db(draft.start_date)),
            end_date: Set(to_db(draft.end_date)),
            power_of_attorney_ref: Set(draft.power_of_attorney_ref),
            is_active: Set(true),
            created_at: Set(to_db(draft.created_at)),
        }
        .insert(&self.database)
        .await
        .map_err(map_db_error)?;
        Proxy::try_from(model)
    }

    async fn proxy(&self, id: i64) -> Result<Option<Proxy>, StoreError> {
        proxy::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?
            .map(Proxy::try_from)
            .transpose()
    }

    async fn proxies_for_unit(&self, property_unit_id: i64) -> Result<Vec<Proxy>, StoreError> {
        proxy::Entity::find()
            .filter(proxy::Column::PropertyUnitId.eq(property_unit_id))
            .order_by_desc(proxy::Column::StartDate)
            .order_by_desc(proxy::Column::Id)
            .all(&self.database)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(Proxy::try_from)
            .collect()
    }

    async fn set_proxy_active(&self, id: i64, active: bool) -> Result<Option<Proxy>, StoreError> {
        let Some(model) = proxy::Entity::find_by_id(id)
            .one(&self.database)
            .await
            .map_err(map_db_error)?
        else {
            return Ok(None);
        };
        let mut model = model.into_active_model();
        model.is_active = Set(active);
        let updated = model.update(&self.database).await.map_err(map_db_error)?;
        Proxy::try_from(updated).map(Some)
    }
}
