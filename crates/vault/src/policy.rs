//! Quorum arithmetic and governance timing policy.

use std::collections::BTreeSet;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use groupvault_core::{GovernanceError, GovernanceResult, UserId};

/// Who may appeal a resolved proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealEligibility {
    /// Members who did not back the outcome, plus the member the action
    /// targeted. Abstaining counts as not backing an approval.
    Dissenters,
    /// Any active member.
    AnyMember,
}

impl AppealEligibility {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dissenters" => Some(AppealEligibility::Dissenters),
            "any_member" | "any" => Some(AppealEligibility::AnyMember),
            _ => None,
        }
    }
}

/// Tunable governance policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernancePolicy {
    /// Fraction of active members whose approval is required, in (0, 1].
    pub quorum_fraction: Decimal,
    /// Lifetime of a pending proposal.
    pub proposal_ttl: Duration,
    /// How long after resolution an appeal may be filed.
    pub appeal_window: Duration,
    /// Lifetime of an appeal re-vote; shorter than `proposal_ttl`.
    pub appeal_ttl: Duration,
    /// Whether members holding `CanInvite` add members without a vote.
    pub unilateral_invites: bool,
    pub appeal_eligibility: AppealEligibility,
}

impl Default for GovernancePolicy {
    fn default() -> Self {
        Self {
            quorum_fraction: Decimal::new(5, 1),
            proposal_ttl: Duration::days(7),
            appeal_window: Duration::days(3),
            appeal_ttl: Duration::days(2),
            unilateral_invites: true,
            appeal_eligibility: AppealEligibility::Dissenters,
        }
    }
}

impl GovernancePolicy {
    pub fn validate(&self) -> GovernanceResult<()> {
        if self.quorum_fraction <= Decimal::ZERO || self.quorum_fraction > Decimal::ONE {
            return Err(GovernanceError::validation(format!(
                "quorum fraction must be in (0, 1], got {}",
                self.quorum_fraction
            )));
        }
        if self.proposal_ttl <= Duration::zero() || self.appeal_window <= Duration::zero() {
            return Err(GovernanceError::validation(
                "proposal ttl and appeal window must be positive",
            ));
        }
        if self.appeal_ttl <= Duration::zero() || self.appeal_ttl >= self.proposal_ttl {
            return Err(GovernanceError::validation(
                "appeal ttl must be positive and shorter than the proposal ttl",
            ));
        }
        Ok(())
    }

    /// Approvals needed among `active_members`: `max(1, ceil(n × fraction))`.
    pub fn threshold(&self, active_members: usize) -> usize {
        let raw = (Decimal::from(active_members as u64) * self.quorum_fraction).ceil();
        raw.to_usize().unwrap_or(active_members).max(1)
    }
}

/// Outcome of a tally once it is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Reject,
}

/// One round of votes. Each member votes at most once per round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub votes_for: BTreeSet<UserId>,
    pub votes_against: BTreeSet<UserId>,
}

impl Tally {
    pub fn has_voted(&self, voter: UserId) -> bool {
        self.votes_for.contains(&voter) || self.votes_against.contains(&voter)
    }

    /// Record a vote; `Err(AlreadyVoted)` leaves the tally untouched.
    pub fn cast(&mut self, voter: UserId, approve: bool) -> GovernanceResult<()> {
        if self.has_voted(voter) {
            return Err(GovernanceError::AlreadyVoted);
        }
        if approve {
            self.votes_for.insert(voter);
        } else {
            self.votes_against.insert(voter);
        }
        Ok(())
    }

    /// Decide the round, counting only votes from currently eligible members.
    ///
    /// Rejection wins whenever both sides could claim the threshold, and as
    /// soon as approval can no longer be reached with the remaining
    /// undecided members.
    pub fn decide(
        &self,
        is_eligible: impl Fn(&UserId) -> bool,
        eligible_count: usize,
        threshold: usize,
    ) -> Option<Decision> {
        let approvals = self.votes_for.iter().filter(|u| is_eligible(u)).count();
        let rejections = self.votes_against.iter().filter(|u| is_eligible(u)).count();
        let undecided = eligible_count.saturating_sub(approvals + rejections);

        if rejections >= threshold {
            return Some(Decision::Reject);
        }
        if approvals >= threshold {
            return Some(Decision::Approve);
        }
        if approvals + undecided < threshold {
            return Some(Decision::Reject);
        }
        None
    }

    /// Decide a round whose deadline has passed: only a reached approval
    /// threshold approves.
    pub fn decide_at_deadline(
        &self,
        is_eligible: impl Fn(&UserId) -> bool,
        threshold: usize,
    ) -> Decision {
        let approvals = self.votes_for.iter().filter(|u| is_eligible(u)).count();
        let rejections = self.votes_against.iter().filter(|u| is_eligible(u)).count();
        if approvals >= threshold && rejections < threshold {
            Decision::Approve
        } else {
            Decision::Reject
        }
    }
}
