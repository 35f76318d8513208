//! Proposal engine: collective decisions gated by quorum.
//!
//! ```text
//! Pending --quorum approves--> Approved --executed--> Executed
//!    |                            \--execution fails--> Rejected (with reason)
//!    |--quorum rejects / approval unreachable--> Rejected
//!    \--ttl elapses--> Expired
//! Executed | Rejected --appeal within window--> Appealed (see crate::appeal)
//! ```
//!
//! Time-based transitions are applied lazily: every operation touching a
//! proposal first calls [`VaultState::refresh_proposal`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use groupvault_auth::{Capability, Role};
use groupvault_core::{
    Amount, Entity, GovernanceError, GovernanceResult, ProposalId, TransactionId, UserId, VaultId,
};

use crate::appeal::Appeal;
use crate::events::GovernanceEvent;
use crate::policy::{Decision, GovernancePolicy, Tally};
use crate::state::VaultState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Appealed,
    Expired,
}

impl ProposalStatus {
    /// Whether the proposal currently accepts votes.
    pub fn is_open(&self) -> bool {
        matches!(self, ProposalStatus::Pending | ProposalStatus::Appealed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    InviteMember,
    RemoveMember,
    ChangeRole,
    Withdraw,
    TransferOwnership,
    EditRules,
}

impl ActionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "invite_member" => Some(ActionType::InviteMember),
            "remove_member" => Some(ActionType::RemoveMember),
            "change_role" => Some(ActionType::ChangeRole),
            "withdraw" => Some(ActionType::Withdraw),
            "transfer_ownership" => Some(ActionType::TransferOwnership),
            "edit_rules" => Some(ActionType::EditRules),
            _ => None,
        }
    }
}

/// The action a proposal would carry out, with its action-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedAction {
    InviteMember { user_id: UserId, role: Role },
    RemoveMember { member: UserId },
    ChangeRole { member: UserId, role: Role },
    Withdraw { amount: Amount, description: Option<String> },
    /// `outgoing_role` is the role the current owner takes afterwards.
    TransferOwnership { new_owner: UserId, outgoing_role: Role },
    EditRules { rules: String },
}

impl ProposedAction {
    pub fn action_type(&self) -> ActionType {
        match self {
            ProposedAction::InviteMember { .. } => ActionType::InviteMember,
            ProposedAction::RemoveMember { .. } => ActionType::RemoveMember,
            ProposedAction::ChangeRole { .. } => ActionType::ChangeRole,
            ProposedAction::Withdraw { .. } => ActionType::Withdraw,
            ProposedAction::TransferOwnership { .. } => ActionType::TransferOwnership,
            ProposedAction::EditRules { .. } => ActionType::EditRules,
        }
    }

    pub fn target_id(&self) -> Option<UserId> {
        match self {
            ProposedAction::InviteMember { user_id, .. } => Some(*user_id),
            ProposedAction::RemoveMember { member } | ProposedAction::ChangeRole { member, .. } => {
                Some(*member)
            }
            ProposedAction::TransferOwnership { new_owner, .. } => Some(*new_owner),
            ProposedAction::Withdraw { .. } | ProposedAction::EditRules { .. } => None,
        }
    }

    pub fn new_role(&self) -> Option<Role> {
        match self {
            ProposedAction::ChangeRole { role, .. } => Some(*role),
            ProposedAction::TransferOwnership { .. } => Some(Role::Owner),
            ProposedAction::InviteMember { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// The member directly harmed if this action executes.
    pub fn affected_member(&self) -> Option<UserId> {
        match self {
            ProposedAction::RemoveMember { member } | ProposedAction::ChangeRole { member, .. } => {
                Some(*member)
            }
            _ => None,
        }
    }
}

/// Loosely-typed proposal request, as received from a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub target: Option<UserId>,
    pub new_role: Option<Role>,
    pub amount: Option<Decimal>,
    pub rules: Option<String>,
    pub description: Option<String>,
}

impl ActionRequest {
    pub fn into_action(self, action_type: ActionType) -> GovernanceResult<ProposedAction> {
        let target = |t: Option<UserId>| {
            t.ok_or_else(|| GovernanceError::validation("this action requires a target member"))
        };

        Ok(match action_type {
            ActionType::InviteMember => ProposedAction::InviteMember {
                user_id: target(self.target)?,
                role: self.new_role.unwrap_or(Role::Member),
            },
            ActionType::RemoveMember => ProposedAction::RemoveMember {
                member: target(self.target)?,
            },
            ActionType::ChangeRole => ProposedAction::ChangeRole {
                member: target(self.target)?,
                role: self
                    .new_role
                    .ok_or_else(|| GovernanceError::validation("change_role requires a new role"))?,
            },
            ActionType::Withdraw => ProposedAction::Withdraw {
                amount: Amount::new(
                    self.amount
                        .ok_or_else(|| GovernanceError::validation("withdraw requires an amount"))?,
                )?,
                description: self.description,
            },
            ActionType::TransferOwnership => ProposedAction::TransferOwnership {
                new_owner: target(self.target)?,
                outgoing_role: self.new_role.unwrap_or(Role::Admin),
            },
            ActionType::EditRules => ProposedAction::EditRules {
                rules: self
                    .rules
                    .ok_or_else(|| GovernanceError::validation("edit_rules requires rules text"))?,
            },
        })
    }
}

/// What an executed proposal changed, kept so an appeal can undo it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionRecord {
    MemberInvited {
        user_id: UserId,
    },
    MemberRemoved {
        user_id: UserId,
        role: Role,
    },
    RoleChanged {
        user_id: UserId,
        previous: Role,
    },
    Withdrawn {
        transaction_id: TransactionId,
        amount: Amount,
    },
    OwnershipTransferred {
        previous_owner: UserId,
        new_owner: UserId,
        new_owner_previous_role: Role,
    },
    RulesEdited {
        previous: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultActionProposal {
    pub id: ProposalId,
    pub vault_id: VaultId,
    pub proposer_id: UserId,
    pub action: ProposedAction,
    /// Votes of the original round.
    pub tally: Tally,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub appeal_deadline: Option<DateTime<Utc>>,
    /// Why an approved action did not take (or could not be undone).
    pub failure_reason: Option<String>,
    pub execution: Option<ExecutionRecord>,
    pub appeal: Option<Appeal>,
}

impl Entity for VaultActionProposal {
    type Id = ProposalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl VaultActionProposal {
    pub fn action_type(&self) -> ActionType {
        self.action.action_type()
    }

    pub fn target_id(&self) -> Option<UserId> {
        self.action.target_id()
    }

    pub fn new_role(&self) -> Option<Role> {
        self.action.new_role()
    }

    pub fn votes_for(&self) -> &BTreeSet<UserId> {
        &self.tally.votes_for
    }

    pub fn votes_against(&self) -> &BTreeSet<UserId> {
        &self.tally.votes_against
    }

    /// The tally currently accepting votes: the appeal re-vote while appealed.
    pub fn current_round(&self) -> &Tally {
        match (&self.appeal, self.status) {
            (Some(appeal), ProposalStatus::Appealed) => &appeal.tally,
            _ => &self.tally,
        }
    }

    fn current_round_mut(&mut self) -> &mut Tally {
        match (&mut self.appeal, self.status) {
            (Some(appeal), ProposalStatus::Appealed) => &mut appeal.tally,
            _ => &mut self.tally,
        }
    }
}

impl VaultState {
    /// Open a proposal.
    ///
    /// Structural checks (membership, last-owner protection) happen now;
    /// balance and limit checks for withdrawals happen at execution time,
    /// since the balance may change before quorum is reached.
    pub fn propose(
        &mut self,
        proposer: UserId,
        action: ProposedAction,
        policy: &GovernancePolicy,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VaultActionProposal> {
        self.ensure_active()?;
        self.require(proposer, Capability::CanPropose)?;
        self.validate_action(proposer, &action)?;

        let proposal = VaultActionProposal {
            id: ProposalId::new(),
            vault_id: self.vault.id,
            proposer_id: proposer,
            action,
            tally: Tally::default(),
            status: ProposalStatus::Pending,
            created_at: now,
            expires_at: now + policy.proposal_ttl,
            resolved_at: None,
            appeal_deadline: None,
            failure_reason: None,
            execution: None,
            appeal: None,
        };
        self.proposals.insert(proposal.id, proposal.clone());
        self.record(GovernanceEvent::ProposalCreated {
            vault_id: self.vault.id,
            proposal_id: proposal.id,
            proposer_id: proposer,
            action_type: proposal.action_type(),
            at: now,
        });

        tracing::info!(
            vault_id = %self.vault.id,
            proposal_id = %proposal.id,
            action = ?proposal.action_type(),
            "proposal created"
        );
        Ok(proposal)
    }

    /// Cast a vote on the proposal's current round and resolve it if decided.
    ///
    /// Execution failures are recorded on the proposal (status `Rejected`
    /// with a reason); they are not returned to the voter.
    pub fn vote(
        &mut self,
        proposal_id: ProposalId,
        voter: UserId,
        approve: bool,
        policy: &GovernancePolicy,
        now: DateTime<Utc>,
    ) -> GovernanceResult<VaultActionProposal> {
        let lapsed = self.refresh_proposal(proposal_id, policy, now)?;
        let status = self.proposal_ref(proposal_id)?.status;
        if lapsed || status == ProposalStatus::Expired {
            return Err(GovernanceError::ProposalExpired);
        }
        if !status.is_open() {
            return Err(GovernanceError::ProposalClosed);
        }
        self.ensure_active()?;
        self.require(voter, Capability::CanVote)?;

        self.proposal_mut(proposal_id)?
            .current_round_mut()
            .cast(voter, approve)?;
        self.record(GovernanceEvent::VoteCast {
            vault_id: self.vault.id,
            proposal_id,
            voter_id: voter,
            approve,
            at: now,
        });
        tracing::debug!(vault_id = %self.vault.id, %proposal_id, %voter, approve, "vote cast");

        let eligible = self.active_member_count();
        let threshold = policy.threshold(eligible);
        let decision = self.proposal_ref(proposal_id)?.current_round().decide(
            |u| self.is_active_member(*u),
            eligible,
            threshold,
        );

        match (status, decision) {
            (_, None) => {}
            (ProposalStatus::Appealed, Some(decision)) => {
                self.resolve_appeal(proposal_id, decision, now)?;
            }
            (_, Some(Decision::Approve)) => self.approve_and_execute(proposal_id, policy, now)?,
            (_, Some(Decision::Reject)) => {
                self.close(proposal_id, ProposalStatus::Rejected, None, policy, now)?
            }
        }

        self.proposal_ref(proposal_id).cloned()
    }

    /// Apply any due time-based transition to one proposal.
    ///
    /// Returns `true` if the proposal's status changed.
    pub fn refresh_proposal(
        &mut self,
        proposal_id: ProposalId,
        policy: &GovernancePolicy,
        now: DateTime<Utc>,
    ) -> GovernanceResult<bool> {
        let proposal = self.proposal_ref(proposal_id)?;

        match (proposal.status, &proposal.appeal) {
            (ProposalStatus::Pending, _) if now >= proposal.expires_at => {
                let expires_at = proposal.expires_at;
                let p = self.proposal_mut(proposal_id)?;
                p.status = ProposalStatus::Expired;
                p.resolved_at = Some(expires_at);
                self.record(GovernanceEvent::ProposalResolved {
                    vault_id: self.vault.id,
                    proposal_id,
                    status: ProposalStatus::Expired,
                    reason: Some("no quorum before the deadline".to_string()),
                    at: now,
                });
                tracing::debug!(vault_id = %self.vault.id, %proposal_id, "proposal expired");
                Ok(true)
            }
            (ProposalStatus::Appealed, Some(appeal)) if now >= appeal.deadline => {
                let threshold = policy.threshold(self.active_member_count());
                let decision = appeal
                    .tally
                    .decide_at_deadline(|u| self.is_active_member(*u), threshold);
                tracing::debug!(vault_id = %self.vault.id, %proposal_id, ?decision, "appeal re-vote lapsed");
                self.resolve_appeal(proposal_id, decision, now)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Refresh every proposal of the vault; returns how many changed.
    pub fn refresh_all(&mut self, policy: &GovernancePolicy, now: DateTime<Utc>) -> GovernanceResult<usize> {
        let ids: Vec<ProposalId> = self
            .proposals
            .values()
            .filter(|p| p.status.is_open())
            .map(|p| p.id)
            .collect();

        let mut changed = 0;
        for id in ids {
            if self.refresh_proposal(id, policy, now)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    pub(crate) fn proposal_ref(&self, id: ProposalId) -> GovernanceResult<&VaultActionProposal> {
        self.proposals
            .get(&id)
            .ok_or(GovernanceError::not_found("proposal"))
    }

    pub(crate) fn proposal_mut(&mut self, id: ProposalId) -> GovernanceResult<&mut VaultActionProposal> {
        self.proposals
            .get_mut(&id)
            .ok_or(GovernanceError::not_found("proposal"))
    }

    fn validate_action(&self, proposer: UserId, action: &ProposedAction) -> GovernanceResult<()> {
        match action {
            ProposedAction::InviteMember { user_id, role } => {
                if *role == Role::Owner {
                    return Err(GovernanceError::validation(
                        "ownership can only be transferred, not granted",
                    ));
                }
                if self.is_active_member(*user_id) {
                    return Err(GovernanceError::validation("user is already an active member"));
                }
            }
            ProposedAction::RemoveMember { member } => {
                if self.get_role(*member)? == Role::Owner {
                    return Err(GovernanceError::LastOwnerProtected);
                }
            }
            ProposedAction::ChangeRole { member, role } => {
                let current = self.get_role(*member)?;
                if current == Role::Owner {
                    return Err(GovernanceError::LastOwnerProtected);
                }
                if *role == Role::Owner {
                    return Err(GovernanceError::validation(
                        "use a TransferOwnership proposal to change the owner",
                    ));
                }
                if current == *role {
                    return Err(GovernanceError::validation(format!("member is already {role}")));
                }
            }
            ProposedAction::TransferOwnership {
                new_owner,
                outgoing_role,
            } => {
                self.require(proposer, Capability::CanTransferOwnership)?;
                if self.get_role(*new_owner)? == Role::Owner {
                    return Err(GovernanceError::validation("user already owns this vault"));
                }
                if *outgoing_role == Role::Owner {
                    return Err(GovernanceError::validation(
                        "outgoing owner must take a lesser role",
                    ));
                }
            }
            ProposedAction::Withdraw { .. } | ProposedAction::EditRules { .. } => {}
        }
        Ok(())
    }

    fn approve_and_execute(
        &mut self,
        proposal_id: ProposalId,
        policy: &GovernancePolicy,
        now: DateTime<Utc>,
    ) -> GovernanceResult<()> {
        let p = self.proposal_mut(proposal_id)?;
        p.status = ProposalStatus::Approved;
        let (proposer, action) = (p.proposer_id, p.action.clone());

        match self.execute_action(proposer, &action, now) {
            Ok(record) => {
                self.proposal_mut(proposal_id)?.execution = Some(record);
                self.close(proposal_id, ProposalStatus::Executed, None, policy, now)
            }
            Err(e) => {
                tracing::warn!(vault_id = %self.vault.id, %proposal_id, error = %e, "approved proposal failed to execute");
                self.close(
                    proposal_id,
                    ProposalStatus::Rejected,
                    Some(e.to_string()),
                    policy,
                    now,
                )
            }
        }
    }

    /// Apply an approved action. Idempotence comes from the caller: only a
    /// proposal transitioning out of `Pending`/`Appealed` ever executes.
    pub(crate) fn execute_action(
        &mut self,
        proposer: UserId,
        action: &ProposedAction,
        now: DateTime<Utc>,
    ) -> GovernanceResult<ExecutionRecord> {
        self.ensure_active()?;
        match action {
            ProposedAction::InviteMember { user_id, role } => {
                self.add_member(*user_id, *role, BTreeSet::new(), now)?;
                Ok(ExecutionRecord::MemberInvited { user_id: *user_id })
            }
            ProposedAction::RemoveMember { member } => {
                let role = self.remove_member(*member, now)?;
                Ok(ExecutionRecord::MemberRemoved {
                    user_id: *member,
                    role,
                })
            }
            ProposedAction::ChangeRole { member, role } => {
                let previous = self.change_role(*member, *role, now)?;
                Ok(ExecutionRecord::RoleChanged {
                    user_id: *member,
                    previous,
                })
            }
            ProposedAction::Withdraw {
                amount,
                description,
            } => match self.withdraw(proposer, *amount, description.clone(), now) {
                Ok(tx) => Ok(ExecutionRecord::Withdrawn {
                    transaction_id: tx.id,
                    amount: *amount,
                }),
                Err(
                    e @ (GovernanceError::InsufficientFunds { .. }
                    | GovernanceError::LimitExceeded { .. }),
                ) => {
                    self.record_failed_withdrawal(proposer, *amount, &e, now);
                    Err(e)
                }
                Err(e) => Err(e),
            },
            ProposedAction::TransferOwnership {
                new_owner,
                outgoing_role,
            } => {
                let (previous_owner, new_owner_previous_role) =
                    self.transfer_ownership(*new_owner, *outgoing_role, now)?;
                Ok(ExecutionRecord::OwnershipTransferred {
                    previous_owner,
                    new_owner: *new_owner,
                    new_owner_previous_role,
                })
            }
            ProposedAction::EditRules { rules } => {
                let previous = self.set_rules(rules.clone(), now);
                Ok(ExecutionRecord::RulesEdited { previous })
            }
        }
    }

    /// Move a proposal to a resolved status and open its appeal window.
    fn close(
        &mut self,
        proposal_id: ProposalId,
        status: ProposalStatus,
        reason: Option<String>,
        policy: &GovernancePolicy,
        now: DateTime<Utc>,
    ) -> GovernanceResult<()> {
        let p = self.proposal_mut(proposal_id)?;
        p.status = status;
        p.resolved_at = Some(now);
        p.appeal_deadline = Some(now + policy.appeal_window);
        p.failure_reason = reason.clone();

        self.record(GovernanceEvent::ProposalResolved {
            vault_id: self.vault.id,
            proposal_id,
            status,
            reason,
            at: now,
        });
        tracing::info!(vault_id = %self.vault.id, %proposal_id, ?status, "proposal resolved");
        Ok(())
    }
}
