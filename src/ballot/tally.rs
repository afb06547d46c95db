use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::assembly::{
    OptionTally, QuorumStatus, Vote, Voting, VotingOption, VotingOutcome, VotingResults,
    VotingType,
};

const PERCENTAGE_SCALE: u32 = 2;

/// Round-half-up (midpoint away from zero) to two decimals.
pub fn round_percentage(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PERCENTAGE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub fn percentage(part: u64, whole: u64) -> Decimal {
    ratio_percentage(Decimal::from(part), Decimal::from(whole))
}

pub fn ratio_percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round_percentage(part * Decimal::ONE_HUNDRED / whole)
}

/// Computed results for one motion, minus quorum which is read fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub voting_id: i64,
    pub voting_type: VotingType,
    pub required_percentage: Decimal,
    pub total_votes: u64,
    pub counted_votes: u64,
    pub abstentions: u64,
    pub affirmative_votes: u64,
    pub options: Vec<OptionTally>,
    pub affirmative_percentage: Decimal,
    pub outcome: VotingOutcome,
}

impl Tally {
    pub fn results(&self, quorum: Option<QuorumStatus>) -> VotingResults {
        VotingResults {
            voting_id: self.voting_id,
            voting_type: self.voting_type,
            required_percentage: self.required_percentage,
            total_votes: self.total_votes,
            counted_votes: self.counted_votes,
            abstentions: self.abstentions,
            options: self.options.clone(),
            affirmative_percentage: self.affirmative_percentage,
            outcome: self.outcome,
            quorum,
        }
    }
}

/// Tallies `votes` over `options`. Votes pointing at options outside the
/// list are ignored.
pub fn tally(voting: &Voting, options: &[VotingOption], votes: &[Vote]) -> Tally {
    let mut counts: HashMap<i64, u64> = options.iter().map(|option| (option.id, 0)).collect();
    for vote in votes {
        if let Some(count) = counts.get_mut(&vote.voting_option_id) {
            *count += 1;
        }
    }

    let count_for = |option: &VotingOption| counts.get(&option.id).copied().unwrap_or_default();
    let total_votes: u64 = counts.values().sum();
    let abstentions: u64 = options
        .iter()
        .filter(|option| option.is_abstention())
        .map(count_for)
        .sum();
    let affirmative_votes: u64 = options
        .iter()
        .filter(|option| option.is_affirmative())
        .map(count_for)
        .sum();
    let counted_votes = total_votes - abstentions;

    let option_tallies = options
        .iter()
        .map(|option| {
            let votes = count_for(option);
            let denominator = if option.is_abstention() {
                total_votes
            } else {
                counted_votes
            };
            OptionTally {
                option_id: option.id,
                code: option.code.clone(),
                text: option.text.clone(),
                color: option.color.clone(),
                votes,
                percentage: percentage(votes, denominator),
            }
        })
        .collect();

    let affirmative_percentage = percentage(affirmative_votes, counted_votes);
    let passed = match voting.voting_type {
        // 99.999% rounds to 100.00; unanimity needs every counted vote.
        VotingType::Unanimity => counted_votes > 0 && affirmative_votes == counted_votes,
        VotingType::Simple | VotingType::Majority => {
            counted_votes > 0 && affirmative_percentage >= voting.required_percentage
        }
    };

    Tally {
        voting_id: voting.id,
        voting_type: voting.voting_type,
        required_percentage: voting.required_percentage,
        total_votes,
        counted_votes,
        abstentions,
        affirmative_votes,
        options: option_tallies,
        affirmative_percentage,
        outcome: if passed {
            VotingOutcome::Passed
        } else {
            VotingOutcome::Failed
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn voting(voting_type: VotingType, required: Decimal) -> Voting {
        Voting {
            id: 7,
            voting_group_id: 1,
            title: "Approve 2027 budget".to_string(),
            description: None,
            voting_type,
            is_secret: false,
            allow_abstention: true,
            required_percentage: required,
            display_order: 0,
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    fn option(id: i64, code: &str) -> VotingOption {
        VotingOption {
            id,
            voting_id: 7,
            text: code.to_uppercase(),
            code: code.to_string(),
            color: None,
            display_order: id as i32,
            is_active: true,
        }
    }

    fn ballots(option_id: i64, count: usize, first_id: i64) -> Vec<Vote> {
        (0..count as i64)
            .map(|offset| Vote {
                id: first_id + offset,
                voting_id: 7,
                property_unit_id: first_id + offset,
                voting_option_id: option_id,
                cast_by_proxy_id: None,
                voted_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
                ip_address: None,
                user_agent: None,
            })
            .collect()
    }

    fn options() -> Vec<VotingOption> {
        vec![option(1, "yes"), option(2, "no"), option(3, "abstain")]
    }

    #[test]
    fn seventy_thirty_passes_at_sixty_six() {
        let mut votes = ballots(1, 70, 1);
        votes.extend(ballots(2, 30, 100));
        let tally = tally(&voting(VotingType::Majority, Decimal::from(66)), &options(), &votes);
        assert_eq!(tally.affirmative_percentage, Decimal::from(70));
        assert_eq!(tally.outcome, VotingOutcome::Passed);
    }

    #[test]
    fn sixty_forty_fails_at_sixty_six() {
        let mut votes = ballots(1, 60, 1);
        votes.extend(ballots(2, 40, 100));
        let tally = tally(&voting(VotingType::Majority, Decimal::from(66)), &options(), &votes);
        assert_eq!(tally.affirmative_percentage, Decimal::from(60));
        assert_eq!(tally.outcome, VotingOutcome::Failed);
    }

    #[test]
    fn abstentions_leave_the_denominator() {
        let mut votes = ballots(1, 6, 1);
        votes.extend(ballots(2, 4, 100));
        votes.extend(ballots(3, 10, 200));
        let tally = tally(&voting(VotingType::Simple, Decimal::from(50)), &options(), &votes);

        assert_eq!(tally.total_votes, 20);
        assert_eq!(tally.counted_votes, 10);
        assert_eq!(tally.abstentions, 10);
        assert_eq!(tally.affirmative_percentage, Decimal::from(60));
        assert_eq!(tally.options[0].percentage, Decimal::from(60));
        assert_eq!(tally.options[1].percentage, Decimal::from(40));
        assert_eq!(tally.options[2].percentage, Decimal::from(50));
        assert_eq!(tally.outcome, VotingOutcome::Passed);
    }

    #[test]
    fn rounded_percentage_meets_boundary() {
        // 2 of 3 = 66.666.. rounds to 66.67
        let mut votes = ballots(1, 2, 1);
        votes.extend(ballots(2, 1, 100));
        let tally = tally(
            &voting(VotingType::Majority, Decimal::new(6667, 2)),
            &options(),
            &votes,
        );
        assert_eq!(tally.affirmative_percentage, Decimal::new(6667, 2));
        assert_eq!(tally.outcome, VotingOutcome::Passed);
    }

    #[test]
    fn midpoint_rounds_up() {
        assert_eq!(round_percentage(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(percentage(1, 8), Decimal::new(1250, 2));
        assert_eq!(percentage(1, 0), Decimal::ZERO);
    }

    #[test]
    fn no_counted_votes_fails() {
        let simple = voting(VotingType::Simple, Decimal::ZERO);
        let empty = tally(&simple, &options(), &[]);
        assert_eq!(empty.outcome, VotingOutcome::Failed);
        assert_eq!(empty.affirmative_percentage, Decimal::ZERO);

        let only_abstained = tally(&simple, &options(), &ballots(3, 5, 1));
        assert_eq!(only_abstained.counted_votes, 0);
        assert_eq!(only_abstained.outcome, VotingOutcome::Failed);
    }

    #[test]
    fn unanimity_requires_every_counted_vote() {
        let unanimity = voting(VotingType::Unanimity, Decimal::ONE_HUNDRED);
        let mut votes = ballots(1, 99_999, 1);
        let all_yes = tally(&unanimity, &options(), &votes);
        assert_eq!(all_yes.outcome, VotingOutcome::Passed);

        votes.extend(ballots(2, 1, 200_000));
        let one_against = tally(&unanimity, &options(), &votes);
        assert_eq!(one_against.affirmative_percentage, Decimal::ONE_HUNDRED);
        assert_eq!(one_against.outcome, VotingOutcome::Failed);
    }
}
