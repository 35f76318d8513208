use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupvault_auth::Role;
use groupvault_core::{Amount, ProposalId, TransactionId, UserId, VaultId};
use groupvault_events::Event;

use crate::proposal::{ActionType, ProposalStatus};

/// Notification emitted for every accepted governance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GovernanceEvent {
    VaultCreated {
        vault_id: VaultId,
        owner_id: UserId,
        name: String,
        at: DateTime<Utc>,
    },
    VaultDeactivated {
        vault_id: VaultId,
        by: UserId,
        at: DateTime<Utc>,
    },
    RulesChanged {
        vault_id: VaultId,
        at: DateTime<Utc>,
    },
    MemberJoined {
        vault_id: VaultId,
        user_id: UserId,
        role: Role,
        at: DateTime<Utc>,
    },
    MemberRemoved {
        vault_id: VaultId,
        user_id: UserId,
        at: DateTime<Utc>,
    },
    RoleChanged {
        vault_id: VaultId,
        user_id: UserId,
        from: Role,
        to: Role,
        at: DateTime<Utc>,
    },
    LimitsChanged {
        vault_id: VaultId,
        user_id: UserId,
        at: DateTime<Utc>,
    },
    FundsDeposited {
        vault_id: VaultId,
        transaction_id: TransactionId,
        user_id: UserId,
        amount: Amount,
        at: DateTime<Utc>,
    },
    FundsWithdrawn {
        vault_id: VaultId,
        transaction_id: TransactionId,
        user_id: UserId,
        amount: Amount,
        at: DateTime<Utc>,
    },
    WithdrawalFailed {
        vault_id: VaultId,
        transaction_id: TransactionId,
        user_id: UserId,
        amount: Amount,
        at: DateTime<Utc>,
    },
    FundsReversed {
        vault_id: VaultId,
        transaction_id: TransactionId,
        reverses: TransactionId,
        amount: Amount,
        at: DateTime<Utc>,
    },
    ProposalCreated {
        vault_id: VaultId,
        proposal_id: ProposalId,
        proposer_id: UserId,
        action_type: ActionType,
        at: DateTime<Utc>,
    },
    VoteCast {
        vault_id: VaultId,
        proposal_id: ProposalId,
        voter_id: UserId,
        approve: bool,
        at: DateTime<Utc>,
    },
    ProposalResolved {
        vault_id: VaultId,
        proposal_id: ProposalId,
        status: ProposalStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    AppealFiled {
        vault_id: VaultId,
        proposal_id: ProposalId,
        appellant_id: UserId,
        at: DateTime<Utc>,
    },
}

impl GovernanceEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            GovernanceEvent::VaultCreated { at, .. }
            | GovernanceEvent::VaultDeactivated { at, .. }
            | GovernanceEvent::RulesChanged { at, .. }
            | GovernanceEvent::MemberJoined { at, .. }
            | GovernanceEvent::MemberRemoved { at, .. }
            | GovernanceEvent::RoleChanged { at, .. }
            | GovernanceEvent::LimitsChanged { at, .. }
            | GovernanceEvent::FundsDeposited { at, .. }
            | GovernanceEvent::FundsWithdrawn { at, .. }
            | GovernanceEvent::WithdrawalFailed { at, .. }
            | GovernanceEvent::FundsReversed { at, .. }
            | GovernanceEvent::ProposalCreated { at, .. }
            | GovernanceEvent::VoteCast { at, .. }
            | GovernanceEvent::ProposalResolved { at, .. }
            | GovernanceEvent::AppealFiled { at, .. } => *at,
        }
    }
}

impl Event for GovernanceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GovernanceEvent::VaultCreated { .. } => "vault.created",
            GovernanceEvent::VaultDeactivated { .. } => "vault.deactivated",
            GovernanceEvent::RulesChanged { .. } => "vault.rules_changed",
            GovernanceEvent::MemberJoined { .. } => "vault.member.joined",
            GovernanceEvent::MemberRemoved { .. } => "vault.member.removed",
            GovernanceEvent::RoleChanged { .. } => "vault.member.role_changed",
            GovernanceEvent::LimitsChanged { .. } => "vault.member.limits_changed",
            GovernanceEvent::FundsDeposited { .. } => "vault.ledger.deposited",
            GovernanceEvent::FundsWithdrawn { .. } => "vault.ledger.withdrawn",
            GovernanceEvent::WithdrawalFailed { .. } => "vault.ledger.withdrawal_failed",
            GovernanceEvent::FundsReversed { .. } => "vault.ledger.reversed",
            GovernanceEvent::ProposalCreated { .. } => "vault.proposal.created",
            GovernanceEvent::VoteCast { .. } => "vault.proposal.vote_cast",
            GovernanceEvent::ProposalResolved { .. } => "vault.proposal.resolved",
            GovernanceEvent::AppealFiled { .. } => "vault.proposal.appeal_filed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.at()
    }
}
