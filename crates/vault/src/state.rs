use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupvault_auth::Role;
use groupvault_core::{AggregateRoot, GovernanceError, GovernanceResult, ProposalId, UserId, VaultId};

use crate::events::GovernanceEvent;
use crate::member::VaultMember;
use crate::proposal::VaultActionProposal;
use crate::transaction::VaultTransaction;
use crate::vault::{GroupVault, NewVault};

/// Aggregate root: one vault's complete mutable state.
///
/// Members and proposals reference the vault by id only; the state owns
/// index-keyed tables of each. All mutation goes through the ledger,
/// membership, proposal and appeal operations; every accepted change bumps
/// `version` and queues a notification in the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultState {
    pub(crate) vault: GroupVault,
    pub(crate) members: BTreeMap<UserId, VaultMember>,
    pub(crate) transactions: Vec<VaultTransaction>,
    pub(crate) proposals: BTreeMap<ProposalId, VaultActionProposal>,
    pub(crate) version: u64,
    #[serde(skip)]
    outbox: Vec<(u64, GovernanceEvent)>,
}

impl AggregateRoot for VaultState {
    type Id = VaultId;

    fn id(&self) -> &Self::Id {
        &self.vault.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl VaultState {
    /// Create a vault; the creator becomes its single active Owner.
    pub fn create(new: NewVault, creator: UserId, now: DateTime<Utc>) -> GovernanceResult<Self> {
        new.validate()?;

        let vault_id = VaultId::new();
        let vault = new.into_vault(vault_id, creator, now);
        let owner = VaultMember::new(vault_id, creator, Role::Owner, now);

        let mut state = Self {
            vault,
            members: BTreeMap::from([(creator, owner)]),
            transactions: Vec::new(),
            proposals: BTreeMap::new(),
            version: 0,
            outbox: Vec::new(),
        };
        state.record(GovernanceEvent::VaultCreated {
            vault_id,
            owner_id: creator,
            name: state.vault.name.clone(),
            at: now,
        });
        Ok(state)
    }

    /// Rebuild a state from stored parts (snapshot restore).
    pub fn from_parts(
        vault: GroupVault,
        members: Vec<VaultMember>,
        transactions: Vec<VaultTransaction>,
        proposals: Vec<VaultActionProposal>,
        version: u64,
    ) -> Self {
        Self {
            members: members.into_iter().map(|m| (m.user_id, m)).collect(),
            proposals: proposals.into_iter().map(|p| (p.id, p)).collect(),
            vault,
            transactions,
            version,
            outbox: Vec::new(),
        }
    }

    pub fn vault(&self) -> &GroupVault {
        &self.vault
    }

    pub fn vault_id(&self) -> VaultId {
        self.vault.id
    }

    pub fn members(&self) -> impl Iterator<Item = &VaultMember> {
        self.members.values()
    }

    pub fn member(&self, user_id: UserId) -> Option<&VaultMember> {
        self.members.get(&user_id)
    }

    /// The append-only transaction log, oldest first.
    pub fn transactions(&self) -> &[VaultTransaction] {
        &self.transactions
    }

    /// Proposals in creation order.
    pub fn proposals(&self) -> impl Iterator<Item = &VaultActionProposal> {
        self.proposals.values()
    }

    pub fn proposal(&self, id: ProposalId) -> Option<&VaultActionProposal> {
        self.proposals.get(&id)
    }

    /// Check the invariants every operation preserves: the balance equals the
    /// log's signed sum and exactly one active Owner, the recorded owner, exists.
    ///
    /// Operations never break these; states built with [`Self::from_parts`]
    /// should be checked before use.
    pub fn check_invariants(&self) -> GovernanceResult<()> {
        if self.balance_from_log() != Some(self.vault.total_balance) {
            return Err(GovernanceError::validation(format!(
                "balance {} does not match the transaction log",
                self.vault.total_balance
            )));
        }
        if self.active_owner_count() != 1 {
            return Err(GovernanceError::validation(format!(
                "expected one active owner, found {}",
                self.active_owner_count()
            )));
        }
        if self.owner().map(|m| m.user_id) != Some(self.vault.owner_id) {
            return Err(GovernanceError::validation(
                "active owner does not match the vault's owner",
            ));
        }
        Ok(())
    }

    /// Drain the notifications queued by mutations since the last call.
    ///
    /// Each event is paired with the aggregate version it was recorded at.
    pub fn take_events(&mut self) -> Vec<(u64, GovernanceEvent)> {
        std::mem::take(&mut self.outbox)
    }

    /// Bump the version and queue a notification for one accepted mutation.
    pub(crate) fn record(&mut self, event: GovernanceEvent) {
        self.version += 1;
        self.vault.updated_at = event.at();
        self.outbox.push((self.version, event));
    }
}
