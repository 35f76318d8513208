use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use groupvault_vault::{GroupVault, VaultActionProposal, VaultMember, VaultState, VaultTransaction};

/// Full read view of one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultDetails {
    pub vault: GroupVault,
    pub members: Vec<VaultMember>,
    pub transactions: Vec<VaultTransaction>,
}

impl VaultDetails {
    pub(crate) fn of(state: &VaultState) -> Self {
        Self {
            vault: state.vault().clone(),
            members: state.members().cloned().collect(),
            transactions: state.transactions().to_vec(),
        }
    }
}

/// Row in a caller's vault list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSummary {
    pub vault: GroupVault,
    pub active_members: usize,
    pub open_proposals: usize,
    /// Progress towards the target amount, when one is set.
    pub progress: Option<Decimal>,
}

impl VaultSummary {
    pub(crate) fn of(state: &VaultState) -> Self {
        Self {
            vault: state.vault().clone(),
            active_members: state.active_member_count(),
            open_proposals: state.proposals().filter(|p| p.status.is_open()).count(),
            progress: state.vault().progress(),
        }
    }
}

/// An invitation either adds the member directly or opens a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InviteOutcome {
    Added { member: VaultMember },
    Proposed { proposal: VaultActionProposal },
}
