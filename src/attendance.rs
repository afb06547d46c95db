//! Attendance ledger for governance sessions.
//!
//! One list per voting group, one record per property unit of the group's
//! business. Quorum is derived on every read; nothing here is cached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::ballot::tally::{percentage, ratio_percentage};
use crate::error::AssemblyError;
use crate::models::assembly::VotingGroup;
use crate::models::attendance::{
    AttendanceList, AttendanceRecord, AttendanceRoster, AttendanceSummary, AttendanceUpdate,
    MarkAttendance, QuorumBasis, SignatureMethod,
};
use crate::models::property::{NewPropertyUnit, PropertyUnit};
use crate::proxy::ProxyRegistry;
use crate::store::{StoreError, VotingStore};
use crate::validation::{
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN, canonical_signature, optional_text, required_text,
};

#[derive(Clone)]
pub struct AttendanceLedger {
    store: Arc<dyn VotingStore>,
    proxies: ProxyRegistry,
    quorum_basis: QuorumBasis,
}

impl AttendanceLedger {
    pub fn new(store: Arc<dyn VotingStore>, proxies: ProxyRegistry, quorum_basis: QuorumBasis) -> Self {
        Self {
            store,
            proxies,
            quorum_basis,
        }
    }

    pub async fn register_property_unit(
        &self,
        request: NewPropertyUnit,
    ) -> Result<PropertyUnit, AssemblyError> {
        let code = required_text(&request.code, MAX_NAME_LEN, "code")?;
        let owner_name = required_text(&request.owner_name, MAX_NAME_LEN, "owner_name")?;
        if request.participation_weight <= Decimal::ZERO {
            return Err(AssemblyError::validation(
                "participation_weight must be positive",
            ));
        }
        let unit = self
            .store
            .insert_property_unit(NewPropertyUnit {
                business_id: request.business_id,
                code,
                owner_name,
                participation_weight: request.participation_weight,
            })
            .await
            .map_err(|err| match err {
                StoreError::Conflict(message) => AssemblyError::Conflict(message),
                other => other.into(),
            })?;
        info!(
            property_unit_id = unit.id,
            business_id = unit.business_id,
            code = %unit.code,
            "property unit registered"
        );
        Ok(unit)
    }

    pub async fn property_units(&self, business_id: i64) -> Result<Vec<PropertyUnit>, AssemblyError> {
        Ok(self.store.property_units_for_business(business_id).await?)
    }

    /// Returns the group's list, creating it with one unattended record per
    /// active unit the first time.
    pub async fn generate_attendance_list(
        &self,
        voting_group_id: i64,
    ) -> Result<AttendanceRoster, AssemblyError> {
        let group = self.group(voting_group_id).await?;
        if let Some(list) = self.store.attendance_list_for_group(group.id).await? {
            debug!(voting_group_id, attendance_list_id = list.id, "attendance list already exists");
            return self.roster(list).await;
        }

        let unit_ids: Vec<i64> = self
            .store
            .property_units_for_business(group.business_id)
            .await?
            .into_iter()
            .filter(|unit| unit.is_active)
            .map(|unit| unit.id)
            .collect();

        let list = match self.store.create_attendance_list(group.id, &unit_ids).await {
            Ok(list) => {
                info!(
                    voting_group_id,
                    attendance_list_id = list.id,
                    units = unit_ids.len(),
                    "attendance list generated"
                );
                list
            }
            // Lost a race with a concurrent generation; hand back the winner.
            Err(StoreError::Conflict(_)) => self
                .store
                .attendance_list_for_group(group.id)
                .await?
                .ok_or_else(|| AssemblyError::not_found("attendance list", voting_group_id))?,
            Err(err) => return Err(err.into()),
        };
        self.roster(list).await
    }

    pub async fn attendance_roster(
        &self,
        attendance_list_id: i64,
    ) -> Result<AttendanceRoster, AssemblyError> {
        let list = self.list(attendance_list_id).await?;
        self.roster(list).await
    }

    pub async fn mark_attendance(
        &self,
        attendance_list_id: i64,
        mark: MarkAttendance,
    ) -> Result<AttendanceRecord, AssemblyError> {
        self.mark_attendance_at(attendance_list_id, mark, Utc::now()).await
    }

    pub async fn mark_attendance_at(
        &self,
        attendance_list_id: i64,
        mark: MarkAttendance,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AssemblyError> {
        let list = self.list(attendance_list_id).await?;
        let group = self.group(list.voting_group_id).await?;
        let unit = self
            .store
            .property_unit(mark.property_unit_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("property unit", mark.property_unit_id))?;
        if unit.business_id != group.business_id {
            return Err(AssemblyError::validation(format!(
                "property unit {} does not belong to business {}",
                unit.id, group.business_id
            )));
        }

        let signature_method = mark
            .signature_method
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                SignatureMethod::parse(raw).ok_or_else(|| {
                    AssemblyError::validation(format!("unsupported signature method {raw}"))
                })
            })
            .transpose()?;
        let signature = canonical_signature(mark.signature)?;
        let notes = optional_text(mark.notes, MAX_DESCRIPTION_LEN, "notes")?;

        let proxy_id = if mark.attended_as_proxy {
            let proxy = self
                .proxies
                .require_active_proxy(mark.proxy_id, unit.id, now)
                .await?;
            Some(proxy.id)
        } else {
            None
        };

        let signed_at = (signature.is_some() || signature_method.is_some()).then_some(now);
        let record = self
            .store
            .upsert_attendance_record(AttendanceUpdate {
                attendance_list_id: list.id,
                property_unit_id: unit.id,
                attended_as_owner: mark.attended_as_owner,
                attended_as_proxy: mark.attended_as_proxy,
                proxy_id,
                signature,
                signature_method,
                signed_at,
                notes,
                updated_at: now,
            })
            .await?;

        info!(
            attendance_list_id = list.id,
            property_unit_id = unit.id,
            attended = record.attended(),
            as_proxy = record.attended_as_proxy,
            "attendance marked"
        );
        Ok(record)
    }

    pub async fn attendance_summary(
        &self,
        attendance_list_id: i64,
    ) -> Result<AttendanceSummary, AssemblyError> {
        let list = self.list(attendance_list_id).await?;
        let group = self.group(list.voting_group_id).await?;
        self.summary_for(&group, &list).await
    }

    /// Summary for the group's list, or `None` when no list was generated.
    pub async fn group_attendance_summary(
        &self,
        voting_group_id: i64,
    ) -> Result<Option<AttendanceSummary>, AssemblyError> {
        let group = self.group(voting_group_id).await?;
        match self.store.attendance_list_for_group(group.id).await? {
            Some(list) => self.summary_for(&group, &list).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn is_present(
        &self,
        voting_group_id: i64,
        property_unit_id: i64,
    ) -> Result<bool, AssemblyError> {
        let Some(list) = self.store.attendance_list_for_group(voting_group_id).await? else {
            return Ok(false);
        };
        Ok(self
            .store
            .attendance_record(list.id, property_unit_id)
            .await?
            .is_some_and(|record| record.attended()))
    }

    async fn summary_for(
        &self,
        group: &VotingGroup,
        list: &AttendanceList,
    ) -> Result<AttendanceSummary, AssemblyError> {
        let records = self.store.attendance_records(list.id).await?;
        let units: HashMap<i64, PropertyUnit> = self
            .store
            .property_units_for_business(group.business_id)
            .await?
            .into_iter()
            .map(|unit| (unit.id, unit))
            .collect();
        Ok(summarize(group, list, &records, &units, self.quorum_basis))
    }

    async fn roster(&self, list: AttendanceList) -> Result<AttendanceRoster, AssemblyError> {
        let records = self.store.attendance_records(list.id).await?;
        Ok(AttendanceRoster { list, records })
    }

    async fn list(&self, attendance_list_id: i64) -> Result<AttendanceList, AssemblyError> {
        self.store
            .attendance_list(attendance_list_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("attendance list", attendance_list_id))
    }

    async fn group(&self, voting_group_id: i64) -> Result<VotingGroup, AssemblyError> {
        self.store
            .voting_group(voting_group_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("voting group", voting_group_id))
    }
}

/// Counts and weights of attended versus listed units.
pub fn summarize(
    group: &VotingGroup,
    list: &AttendanceList,
    records: &[AttendanceRecord],
    units: &HashMap<i64, PropertyUnit>,
    quorum_basis: QuorumBasis,
) -> AttendanceSummary {
    let weight_of = |record: &AttendanceRecord| {
        units
            .get(&record.property_unit_id)
            .map(|unit| unit.participation_weight)
            .unwrap_or(Decimal::ZERO)
    };

    let total_units = records.len() as u64;
    let attended: Vec<&AttendanceRecord> = records.iter().filter(|r| r.attended()).collect();
    let attended_units = attended.len() as u64;
    let attended_as_proxy = attended.iter().filter(|r| r.attended_as_proxy).count() as u64;
    let attended_as_owner = attended_units - attended_as_proxy;
    let total_weight: Decimal = records.iter().map(weight_of).sum();
    let attended_weight: Decimal = attended.iter().map(|r| weight_of(r)).sum();

    let mut summary = AttendanceSummary {
        attendance_list_id: list.id,
        voting_group_id: group.id,
        total_units,
        attended_units,
        attended_as_owner,
        attended_as_proxy,
        total_weight,
        attended_weight,
        attendance_percentage: percentage(attended_units, total_units),
        weight_percentage: ratio_percentage(attended_weight, total_weight),
        quorum_basis,
        requires_quorum: group.requires_quorum,
        quorum_percentage: group.quorum_percentage,
        quorum_met: true,
    };
    if group.requires_quorum {
        summary.quorum_met = group
            .quorum_percentage
            .is_some_and(|required| summary.meets_quorum(required));
    }
    summary
}
