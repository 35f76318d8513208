//! Appeals: a second vote on a resolved proposal.
//!
//! In the re-vote an approving vote means "the action should stand": for an
//! executed proposal it upholds the outcome, for a rejected one it executes
//! the action now. Overturning an executed action runs its compensation.
//! An appeal is filed at most once per proposal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupvault_core::{GovernanceError, GovernanceResult, ProposalId, UserId};

use crate::events::GovernanceEvent;
use crate::policy::{AppealEligibility, Decision, GovernancePolicy, Tally};
use crate::proposal::{ExecutionRecord, ProposalStatus, VaultActionProposal};
use crate::state::VaultState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealOutcome {
    Upheld,
    Overturned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub appellant_id: UserId,
    pub reason: String,
    pub filed_at: DateTime<Utc>,
    /// When the re-vote lapses and is decided on the votes cast so far.
    pub deadline: DateTime<Utc>,
    /// Status the proposal had when the appeal was filed.
    pub original_status: ProposalStatus,
    pub tally: Tally,
    pub outcome: Option<AppealOutcome>,
}

impl VaultState {
    /// File an appeal against an `Executed` or `Rejected` proposal.
    pub fn appeal(
        &mut self,
        proposal_id: ProposalId,
        appellant: UserId,
        reason: String,
        policy: &GovernancePolicy,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VaultActionProposal> {
        self.refresh_proposal(proposal_id, policy, now)?;
        let proposal = self.proposal_ref(proposal_id)?;

        if proposal.appeal.is_some()
            || !matches!(
                proposal.status,
                ProposalStatus::Executed | ProposalStatus::Rejected
            )
        {
            return Err(GovernanceError::ProposalClosed);
        }
        match proposal.appeal_deadline {
            Some(deadline) if now <= deadline => {}
            _ => return Err(GovernanceError::AppealWindowClosed),
        }
        self.ensure_active()?;

        // A member removed by the proposal keeps standing to appeal it.
        let affected = proposal.action.affected_member() == Some(appellant);
        if !affected && !self.is_active_member(appellant) {
            return Err(GovernanceError::NotAMember);
        }
        if !may_appeal(proposal, appellant, policy.appeal_eligibility) {
            return Err(GovernanceError::permission_denied(
                "only members who did not back the outcome may appeal it",
            ));
        }
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(GovernanceError::validation("an appeal needs a reason"));
        }

        let p = self.proposal_mut(proposal_id)?;
        p.appeal = Some(Appeal {
            appellant_id: appellant,
            reason,
            filed_at: now,
            deadline: now + policy.appeal_ttl,
            original_status: p.status,
            tally: Tally::default(),
            outcome: None,
        });
        p.status = ProposalStatus::Appealed;

        self.record(GovernanceEvent::AppealFiled {
            vault_id: self.vault.id,
            proposal_id,
            appellant_id: appellant,
            at: now,
        });
        tracing::info!(vault_id = %self.vault.id, %proposal_id, %appellant, "appeal filed");
        self.proposal_ref(proposal_id).cloned()
    }

    /// Settle an appeal re-vote. `Approve` means the action should stand.
    pub(crate) fn resolve_appeal(
        &mut self,
        proposal_id: ProposalId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> GovernanceResult<()> {
        let p = self.proposal_ref(proposal_id)?;
        let original = p
            .appeal
            .as_ref()
            .map(|a| a.original_status)
            .ok_or(GovernanceError::ProposalClosed)?;
        let (proposer, action, execution, prior_reason) = (
            p.proposer_id,
            p.action.clone(),
            p.execution.clone(),
            p.failure_reason.clone(),
        );

        // The original outcome stands when the re-vote agrees with it.
        let upheld = (original == ProposalStatus::Rejected) == (decision == Decision::Reject);
        let outcome = if upheld {
            AppealOutcome::Upheld
        } else {
            AppealOutcome::Overturned
        };

        let mut new_execution = execution.clone();
        let (status, reason) = match (original, decision) {
            (ProposalStatus::Rejected, Decision::Reject) => (ProposalStatus::Rejected, prior_reason),
            (ProposalStatus::Rejected, Decision::Approve) => {
                match self.execute_action(proposer, &action, now) {
                    Ok(record) => {
                        new_execution = Some(record);
                        (ProposalStatus::Executed, None)
                    }
                    Err(e) => (ProposalStatus::Rejected, Some(e.to_string())),
                }
            }
            (_, Decision::Approve) => (ProposalStatus::Executed, None),
            (_, Decision::Reject) => {
                let undone = match &execution {
                    Some(record) => self.compensate(record, now),
                    None => Ok(()),
                };
                match undone {
                    Ok(()) => (ProposalStatus::Rejected, None),
                    Err(e) => {
                        tracing::warn!(vault_id = %self.vault.id, %proposal_id, error = %e, "compensation failed");
                        (ProposalStatus::Executed, Some(format!("compensation failed: {e}")))
                    }
                }
            }
        };

        let p = self.proposal_mut(proposal_id)?;
        p.status = status;
        p.resolved_at = Some(now);
        p.appeal_deadline = None;
        p.failure_reason = reason.clone();
        p.execution = new_execution;
        if let Some(appeal) = p.appeal.as_mut() {
            appeal.outcome = Some(outcome);
        }

        self.record(GovernanceEvent::ProposalResolved {
            vault_id: self.vault.id,
            proposal_id,
            status,
            reason,
            at: now,
        });
        tracing::info!(vault_id = %self.vault.id, %proposal_id, ?outcome, ?status, "appeal resolved");
        Ok(())
    }

    /// Undo an executed action. Each inverse validates before mutating, so
    /// a failure leaves the vault as it was.
    fn compensate(&mut self, record: &ExecutionRecord, now: DateTime<Utc>) -> GovernanceResult<()> {
        match record {
            ExecutionRecord::Withdrawn { transaction_id, .. } => {
                self.reverse_withdrawal(*transaction_id, now).map(|_| ())
            }
            ExecutionRecord::MemberInvited { user_id } => {
                if self.is_active_member(*user_id) {
                    self.remove_member(*user_id, now)?;
                }
                Ok(())
            }
            ExecutionRecord::MemberRemoved { user_id, role } => {
                self.reinstate_member(*user_id, *role, now)
            }
            ExecutionRecord::RoleChanged { user_id, previous } => {
                self.change_role(*user_id, *previous, now).map(|_| ())
            }
            ExecutionRecord::OwnershipTransferred {
                previous_owner,
                new_owner,
                new_owner_previous_role,
            } => {
                if self.owner().map(|m| m.user_id) != Some(*new_owner) {
                    return Err(GovernanceError::validation(
                        "ownership has changed hands since the transfer",
                    ));
                }
                self.transfer_ownership(*previous_owner, *new_owner_previous_role, now)
                    .map(|_| ())
            }
            ExecutionRecord::RulesEdited { previous } => {
                self.set_rules(previous.clone(), now);
                Ok(())
            }
        }
    }
}

fn may_appeal(proposal: &VaultActionProposal, appellant: UserId, eligibility: AppealEligibility) -> bool {
    match eligibility {
        AppealEligibility::AnyMember => true,
        AppealEligibility::Dissenters => match proposal.status {
            ProposalStatus::Executed => {
                !proposal.votes_for().contains(&appellant)
                    || proposal.action.affected_member() == Some(appellant)
            }
            ProposalStatus::Rejected => {
                proposal.votes_for().contains(&appellant) || proposal.proposer_id == appellant
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::proposal::ProposedAction;
    use crate::transaction::{TransactionStatus, TransactionType};
    use crate::vault::{NewVault, VaultType};
    use chrono::Duration;
    use groupvault_auth::Role;
    use groupvault_core::Amount;
    use rust_decimal_macros::dec;

    fn setup() -> (VaultState, GovernancePolicy, DateTime<Utc>, [UserId; 4]) {
        let now = Utc::now();
        let users = [UserId::new(), UserId::new(), UserId::new(), UserId::new()];
        let mut state = VaultState::create(
            NewVault {
                name: "Trip".to_string(),
                description: String::new(),
                vault_type: VaultType::Travel,
                currency: "USD".to_string(),
                target_amount: None,
                is_public: false,
                rules: None,
            },
            users[0],
            now,
        )
        .unwrap();
        for u in &users[1..] {
            state.add_member(*u, Role::Member, BTreeSet::new(), now).unwrap();
        }
        state
            .deposit(users[0], Amount::new(dec!(500)).unwrap(), None, now)
            .unwrap();
        (state, GovernancePolicy::default(), now, users)
    }

    fn executed_withdrawal(
        state: &mut VaultState,
        policy: &GovernancePolicy,
        now: DateTime<Utc>,
        users: &[UserId; 4],
    ) -> ProposalId {
        let action = ProposedAction::Withdraw {
            amount: Amount::new(dec!(100)).unwrap(),
            description: Some("flights".to_string()),
        };
        let p = state.propose(users[0], action, policy, now).unwrap();
        state.vote(p.id, users[1], true, policy, now).unwrap();
        let p = state.vote(p.id, users[2], true, policy, now).unwrap();
        assert_eq!(p.status, ProposalStatus::Executed);
        p.id
    }

    #[test]
    fn overturned_withdrawal_is_reversed() {
        let (mut state, policy, now, users) = setup();
        let id = executed_withdrawal(&mut state, &policy, now, &users);
        assert_eq!(state.balance(), dec!(400));

        let p = state
            .appeal(id, users[3], "not what we agreed".to_string(), &policy, now)
            .unwrap();
        assert_eq!(p.status, ProposalStatus::Appealed);

        state.vote(id, users[0], false, &policy, now).unwrap();
        let p = state.vote(id, users[1], false, &policy, now).unwrap();

        assert_eq!(p.status, ProposalStatus::Rejected);
        assert_eq!(p.appeal.unwrap().outcome, Some(AppealOutcome::Overturned));
        assert_eq!(state.balance(), dec!(500));

        let reversal = state.transactions().last().unwrap();
        assert_eq!(reversal.tx_type, TransactionType::Deposit);
        assert_eq!(reversal.status, TransactionStatus::Reversed);
        assert!(reversal.reverses.is_some());
        assert_eq!(Some(state.balance()), state.balance_from_log());
    }

    #[test]
    fn upheld_appeal_keeps_the_outcome() {
        let (mut state, policy, now, users) = setup();
        let id = executed_withdrawal(&mut state, &policy, now, &users);
        state
            .appeal(id, users[3], "too expensive".to_string(), &policy, now)
            .unwrap();

        state.vote(id, users[1], true, &policy, now).unwrap();
        let p = state.vote(id, users[2], true, &policy, now).unwrap();
        assert_eq!(p.status, ProposalStatus::Executed);
        assert_eq!(p.appeal.unwrap().outcome, Some(AppealOutcome::Upheld));
        assert_eq!(state.balance(), dec!(400));
    }

    #[test]
    fn supporters_cannot_appeal_an_outcome_they_backed() {
        let (mut state, policy, now, users) = setup();
        let id = executed_withdrawal(&mut state, &policy, now, &users);
        assert!(matches!(
            state.appeal(id, users[1], "changed my mind".to_string(), &policy, now),
            Err(GovernanceError::PermissionDenied(_))
        ));

        let open = GovernancePolicy {
            appeal_eligibility: AppealEligibility::AnyMember,
            ..GovernancePolicy::default()
        };
        assert!(state
            .appeal(id, users[1], "changed my mind".to_string(), &open, now)
            .is_ok());
    }

    #[test]
    fn appeal_outside_the_window_is_refused() {
        let (mut state, policy, now, users) = setup();
        let id = executed_withdrawal(&mut state, &policy, now, &users);
        let late = now + policy.appeal_window + Duration::seconds(1);
        assert_eq!(
            state.appeal(id, users[3], "late".to_string(), &policy, late),
            Err(GovernanceError::AppealWindowClosed)
        );
    }

    #[test]
    fn a_proposal_is_appealed_at_most_once() {
        let (mut state, policy, now, users) = setup();
        let id = executed_withdrawal(&mut state, &policy, now, &users);
        state.appeal(id, users[3], "first".to_string(), &policy, now).unwrap();
        assert_eq!(
            state.appeal(id, users[3], "second".to_string(), &policy, now),
            Err(GovernanceError::ProposalClosed)
        );
    }

    #[test]
    fn pending_proposals_cannot_be_appealed() {
        let (mut state, policy, now, users) = setup();
        let p = state
            .propose(
                users[0],
                ProposedAction::EditRules {
                    rules: "no pets".to_string(),
                },
                &policy,
                now,
            )
            .unwrap();
        assert_eq!(
            state.appeal(p.id, users[3], "why".to_string(), &policy, now),
            Err(GovernanceError::ProposalClosed)
        );
    }

    #[test]
    fn lapsed_re_vote_without_quorum_overturns() {
        let (mut state, policy, now, users) = setup();
        let id = executed_withdrawal(&mut state, &policy, now, &users);
        state.appeal(id, users[3], "no".to_string(), &policy, now).unwrap();
        state.vote(id, users[1], true, &policy, now).unwrap();

        let later = now + policy.appeal_ttl + Duration::seconds(1);
        assert!(state.refresh_proposal(id, &policy, later).unwrap());
        let p = state.proposal(id).unwrap();
        assert_eq!(p.status, ProposalStatus::Rejected);
        assert_eq!(state.balance(), dec!(500));
    }

    #[test]
    fn removed_member_can_appeal_and_be_reinstated() {
        let (mut state, policy, now, users) = setup();
        let target = users[3];
        let p = state
            .propose(users[0], ProposedAction::RemoveMember { member: target }, &policy, now)
            .unwrap();
        state.vote(p.id, users[1], true, &policy, now).unwrap();
        let p = state.vote(p.id, users[2], true, &policy, now).unwrap();
        assert_eq!(p.status, ProposalStatus::Executed);
        assert!(!state.is_active_member(target));

        state
            .appeal(p.id, target, "I paid my share".to_string(), &policy, now)
            .unwrap();
        // Three active members now, threshold 2.
        state.vote(p.id, users[1], false, &policy, now).unwrap();
        let p = state.vote(p.id, users[2], false, &policy, now).unwrap();

        assert_eq!(p.status, ProposalStatus::Rejected);
        assert_eq!(state.get_role(target), Ok(Role::Member));
    }

    #[test]
    fn overturning_a_rejection_executes_the_action() {
        let (mut state, policy, now, users) = setup();
        let p = state
            .propose(
                users[1],
                ProposedAction::EditRules {
                    rules: "monthly dues".to_string(),
                },
                &policy,
                now,
            )
            .unwrap();
        state.vote(p.id, users[2], false, &policy, now).unwrap();
        let p = state.vote(p.id, users[3], false, &policy, now).unwrap();
        assert_eq!(p.status, ProposalStatus::Rejected);

        state
            .appeal(p.id, users[1], "please reconsider".to_string(), &policy, now)
            .unwrap();
        state.vote(p.id, users[0], true, &policy, now).unwrap();
        let p = state.vote(p.id, users[1], true, &policy, now).unwrap();

        assert_eq!(p.status, ProposalStatus::Executed);
        assert_eq!(p.appeal.unwrap().outcome, Some(AppealOutcome::Overturned));
        assert_eq!(state.vault().rules, "monthly dues");
    }
}
