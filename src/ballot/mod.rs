//! Sessions, motions, options and ballots.
//!
//! The durable store is authoritative for tallies. The live cache only
//! mirrors ballots for observers and may lag behind after a crash between
//! persisting and publishing; `warm_live_state` reloads it.
//!
//! Cached tallies are keyed by motion and result generation. Every write that
//! changes a tally bumps the generation, so a tally computed from a read that
//! raced with the write lands under a key no reader asks for again.

pub mod tally;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::attendance::AttendanceLedger;
use crate::error::AssemblyError;
use crate::live::LiveVoteCache;
use crate::models::assembly::{
    CastVote, NewVote, NewVoting, NewVotingGroup, NewVotingOption, QuorumStatus, Vote, VoteView,
    Voting, VotingGroup, VotingOption, VotingResults, VotingType, is_abstention_code,
    normalize_option_code,
};
use crate::proxy::ProxyRegistry;
use crate::store::{StoreError, VotingStore};
use crate::validation::{
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_OPTION_CODE_LEN, MAX_TITLE_LEN, color, optional_text,
    percentage, required_text,
};

use self::tally::Tally;

#[derive(Clone)]
pub struct BallotEngine {
    store: Arc<dyn VotingStore>,
    attendance: AttendanceLedger,
    proxies: ProxyRegistry,
    live: Arc<LiveVoteCache>,
    tallies: Cache<TallyKey, Arc<Tally>>,
    generations: Arc<Mutex<HashMap<i64, u64>>>,
}

/// `(voting_id, result generation)`
pub type TallyKey = (i64, u64);

impl BallotEngine {
    pub fn new(
        store: Arc<dyn VotingStore>,
        attendance: AttendanceLedger,
        proxies: ProxyRegistry,
        live: Arc<LiveVoteCache>,
        tallies: Cache<TallyKey, Arc<Tally>>,
    ) -> Self {
        Self {
            store,
            attendance,
            proxies,
            live,
            tallies,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn create_voting_group(
        &self,
        request: NewVotingGroup,
    ) -> Result<VotingGroup, AssemblyError> {
        let name = required_text(&request.name, MAX_NAME_LEN, "name")?;
        let description = optional_text(request.description, MAX_DESCRIPTION_LEN, "description")?;
        if request.voting_start_date >= request.voting_end_date {
            return Err(AssemblyError::validation(
                "voting_start_date must be before voting_end_date",
            ));
        }
        let quorum_percentage = match (request.requires_quorum, request.quorum_percentage) {
            (true, None) => {
                return Err(AssemblyError::validation(
                    "quorum_percentage is required when requires_quorum is set",
                ));
            }
            (_, Some(value)) => Some(percentage(value, "quorum_percentage")?),
            (false, None) => None,
        };

        let group = self
            .store
            .insert_voting_group(NewVotingGroup {
                business_id: request.business_id,
                name,
                description,
                voting_start_date: request.voting_start_date,
                voting_end_date: request.voting_end_date,
                requires_quorum: request.requires_quorum,
                quorum_percentage,
            })
            .await?;
        info!(
            voting_group_id = group.id,
            business_id = group.business_id,
            requires_quorum = group.requires_quorum,
            "voting group created"
        );
        Ok(group)
    }

    pub async fn voting_groups(&self, business_id: i64) -> Result<Vec<VotingGroup>, AssemblyError> {
        Ok(self.store.voting_groups_for_business(business_id).await?)
    }

    pub async fn voting_group(&self, voting_group_id: i64) -> Result<VotingGroup, AssemblyError> {
        self.store
            .voting_group(voting_group_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("voting group", voting_group_id))
    }

    pub async fn deactivate_voting_group(
        &self,
        voting_group_id: i64,
    ) -> Result<VotingGroup, AssemblyError> {
        let group = self
            .store
            .set_voting_group_active(voting_group_id, false)
            .await?
            .ok_or_else(|| AssemblyError::not_found("voting group", voting_group_id))?;
        info!(voting_group_id, "voting group deactivated");
        Ok(group)
    }

    pub async fn create_voting(&self, request: NewVoting) -> Result<Voting, AssemblyError> {
        let group = self.voting_group(request.voting_group_id).await?;
        if !group.is_active {
            return Err(AssemblyError::VotingClosed(format!(
                "voting group {} is not active",
                group.id
            )));
        }
        let title = required_text(&request.title, MAX_TITLE_LEN, "title")?;
        let description = optional_text(request.description, MAX_DESCRIPTION_LEN, "description")?;

        let required_percentage = match request.voting_type {
            VotingType::Unanimity => Decimal::ONE_HUNDRED,
            other => {
                let value = request
                    .required_percentage
                    .unwrap_or_else(|| other.default_required_percentage());
                let value = percentage(value, "required_percentage")?;
                if value.is_zero() {
                    return Err(AssemblyError::validation(
                        "required_percentage must be greater than 0",
                    ));
                }
                value
            }
        };

        let voting = self
            .store
            .insert_voting(NewVoting {
                voting_group_id: group.id,
                title,
                description,
                voting_type: request.voting_type,
                is_secret: request.is_secret,
                allow_abstention: request.allow_abstention,
                required_percentage: Some(required_percentage),
                display_order: request.display_order,
            })
            .await?;
        info!(
            voting_id = voting.id,
            voting_group_id = group.id,
            voting_type = voting.voting_type.as_str(),
            %required_percentage,
            "voting created"
        );
        Ok(voting)
    }

    pub async fn votings(&self, voting_group_id: i64) -> Result<Vec<Voting>, AssemblyError> {
        let group = self.voting_group(voting_group_id).await?;
        Ok(self.store.votings_for_group(group.id).await?)
    }

    pub async fn voting(&self, voting_id: i64) -> Result<Voting, AssemblyError> {
        self.store
            .voting(voting_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("voting", voting_id))
    }

    /// Closes the motion to further ballots and disconnects its observers.
    pub async fn close_voting(&self, voting_id: i64) -> Result<Voting, AssemblyError> {
        let voting = self
            .store
            .set_voting_active(voting_id, false)
            .await?
            .ok_or_else(|| AssemblyError::not_found("voting", voting_id))?;
        self.live.clear_voting(voting_id);
        self.invalidate_results(voting_id).await;
        info!(voting_id, "voting closed");
        Ok(voting)
    }

    pub async fn create_voting_option(
        &self,
        request: NewVotingOption,
    ) -> Result<VotingOption, AssemblyError> {
        let voting = self.voting(request.voting_id).await?;
        let text = required_text(&request.text, MAX_NAME_LEN, "text")?;
        let code = normalize_option_code(&required_text(
            &request.code,
            MAX_OPTION_CODE_LEN,
            "code",
        )?);
        let option_color = color(request.color)?;
        if is_abstention_code(&code) && !voting.allow_abstention {
            return Err(AssemblyError::validation(format!(
                "voting {} does not allow abstention",
                voting.id
            )));
        }

        let option = self
            .store
            .insert_voting_option(NewVotingOption {
                voting_id: voting.id,
                text,
                code,
                color: option_color,
                display_order: request.display_order,
            })
            .await
            .map_err(|err| match err {
                StoreError::Conflict(message) => AssemblyError::Conflict(message),
                other => other.into(),
            })?;
        self.invalidate_results(voting.id).await;
        debug!(voting_id = voting.id, option_id = option.id, code = %option.code, "voting option created");
        Ok(option)
    }

    pub async fn voting_options(&self, voting_id: i64) -> Result<Vec<VotingOption>, AssemblyError> {
        let voting = self.voting(voting_id).await?;
        Ok(self.store.voting_options(voting.id).await?)
    }

    pub async fn cast_vote(&self, ballot: CastVote) -> Result<VoteView, AssemblyError> {
        self.cast_vote_at(ballot, Utc::now()).await
    }

    /// Records one ballot. The returned receipt is never redacted; observers
    /// of secret motions only see the redacted form.
    pub async fn cast_vote_at(
        &self,
        ballot: CastVote,
        now: DateTime<Utc>,
    ) -> Result<VoteView, AssemblyError> {
        let voting = self.voting(ballot.voting_id).await?;
        if !voting.is_active {
            return Err(AssemblyError::VotingClosed(format!(
                "voting {} is closed",
                voting.id
            )));
        }
        let group = self.voting_group(voting.voting_group_id).await?;
        if !group.is_open_at(now) {
            return Err(AssemblyError::VotingClosed(format!(
                "voting group {} is not accepting ballots",
                group.id
            )));
        }

        let option = self
            .store
            .voting_option(ballot.voting_option_id)
            .await?
            .filter(|option| option.voting_id == voting.id)
            .ok_or_else(|| AssemblyError::not_found("voting option", ballot.voting_option_id))?;
        if !option.is_active {
            return Err(AssemblyError::validation(format!(
                "voting option {} is not active",
                option.id
            )));
        }
        if option.is_abstention() && !voting.allow_abstention {
            return Err(AssemblyError::validation(format!(
                "voting {} does not allow abstention",
                voting.id
            )));
        }

        let unit = self
            .store
            .property_unit(ballot.property_unit_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("property unit", ballot.property_unit_id))?;
        if unit.business_id != group.business_id {
            return Err(AssemblyError::validation(format!(
                "property unit {} does not belong to business {}",
                unit.id, group.business_id
            )));
        }
        if !self.attendance.is_present(group.id, unit.id).await? {
            return Err(AssemblyError::NotInAttendance {
                voting_group_id: group.id,
                property_unit_id: unit.id,
            });
        }
        let cast_by_proxy_id = match ballot.proxy_id {
            Some(proxy_id) => Some(
                self.proxies
                    .require_active_proxy(Some(proxy_id), unit.id, now)
                    .await?
                    .id,
            ),
            None => None,
        };

        let already_voted = AssemblyError::AlreadyVoted {
            voting_id: voting.id,
            property_unit_id: unit.id,
        };
        if self.store.vote_for_unit(voting.id, unit.id).await?.is_some() {
            return Err(already_voted);
        }

        let vote = self
            .store
            .insert_vote(NewVote {
                voting_id: voting.id,
                property_unit_id: unit.id,
                voting_option_id: option.id,
                cast_by_proxy_id,
                voted_at: now,
                ip_address: ballot.metadata.ip_address,
                user_agent: ballot.metadata.user_agent,
            })
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => already_voted,
                other => other.into(),
            })?;

        self.invalidate_results(voting.id).await;
        let receipt = VoteView::from_parts(&vote, &option);
        self.mirror_vote(&voting, receipt.clone()).await?;

        info!(
            voting_id = voting.id,
            vote_id = vote.id,
            by_proxy = cast_by_proxy_id.is_some(),
            "vote cast"
        );
        Ok(receipt)
    }

    pub async fn delete_vote(&self, vote_id: i64) -> Result<Vote, AssemblyError> {
        let vote = self
            .store
            .delete_vote(vote_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("vote", vote_id))?;
        self.invalidate_results(vote.voting_id).await;
        if self.live.remove_vote(vote.voting_id, vote.id).is_none() {
            debug!(voting_id = vote.voting_id, vote_id, "deleted vote was not in live state");
        }
        info!(voting_id = vote.voting_id, vote_id, "vote deleted");
        Ok(vote)
    }

    /// Ballots for the motion; voter identity is hidden for secret motions.
    pub async fn votes(&self, voting_id: i64) -> Result<Vec<VoteView>, AssemblyError> {
        let voting = self.voting(voting_id).await?;
        self.load_views(&voting).await
    }

    /// Seeds the live cache from storage when it has no state for the motion
    /// and returns the current snapshot.
    pub async fn warm_live_state(&self, voting_id: i64) -> Result<Vec<VoteView>, AssemblyError> {
        if self.live.is_initialized(voting_id) {
            return Ok(self.live.voting_state(voting_id));
        }
        let voting = self.voting(voting_id).await?;
        let views = self.load_views(&voting).await?;
        Ok(self.live.initialize_if_absent(voting_id, views))
    }

    pub async fn voting_results(&self, voting_id: i64) -> Result<VotingResults, AssemblyError> {
        let voting = self.voting(voting_id).await?;

        let key = (voting.id, self.results_generation(voting.id));
        let tally = match self.tallies.get(&key).await {
            Some(cached) => cached,
            None => {
                let options = self.store.voting_options(voting.id).await?;
                let votes = self.store.votes_for_voting(voting.id).await?;
                let computed = Arc::new(tally::tally(&voting, &options, &votes));
                self.tallies.insert(key, Arc::clone(&computed)).await;
                computed
            }
        };

        let group = self.voting_group(voting.voting_group_id).await?;
        let quorum = if group.requires_quorum {
            let summary = self.attendance.group_attendance_summary(group.id).await?;
            let required = group.quorum_percentage.unwrap_or(Decimal::ZERO);
            Some(QuorumStatus {
                required_percentage: required,
                attendance_percentage: summary
                    .as_ref()
                    .map(|summary| summary.observed_percentage())
                    .unwrap_or(Decimal::ZERO),
                met: summary.as_ref().map_or(required.is_zero(), |summary| {
                    summary.meets_quorum(required)
                }),
            })
        } else {
            None
        };

        Ok(tally.results(quorum))
    }

    fn results_generation(&self, voting_id: i64) -> u64 {
        self.generations.lock().get(&voting_id).copied().unwrap_or(0)
    }

    async fn invalidate_results(&self, voting_id: i64) {
        let stale = {
            let mut generations = self.generations.lock();
            let generation = generations.entry(voting_id).or_insert(0);
            let stale = *generation;
            *generation += 1;
            stale
        };
        self.tallies.invalidate(&(voting_id, stale)).await;
    }

    async fn mirror_vote(&self, voting: &Voting, receipt: VoteView) -> Result<(), AssemblyError> {
        if !self.live.is_initialized(voting.id) {
            self.warm_live_state(voting.id).await?;
        }
        let view = if voting.is_secret {
            receipt.redacted()
        } else {
            receipt
        };
        self.live.publish_vote(voting.id, view);
        Ok(())
    }

    async fn load_views(&self, voting: &Voting) -> Result<Vec<VoteView>, AssemblyError> {
        let options: HashMap<i64, VotingOption> = self
            .store
            .voting_options(voting.id)
            .await?
            .into_iter()
            .map(|option| (option.id, option))
            .collect();
        let votes = self.store.votes_for_voting(voting.id).await?;

        let mut views = Vec::with_capacity(votes.len());
        for vote in &votes {
            let Some(option) = options.get(&vote.voting_option_id) else {
                warn!(
                    voting_id = voting.id,
                    vote_id = vote.id,
                    option_id = vote.voting_option_id,
                    "vote references an unknown option"
                );
                continue;
            };
            let view = VoteView::from_parts(vote, option);
            views.push(if voting.is_secret { view.redacted() } else { view });
        }
        Ok(views)
    }
}
