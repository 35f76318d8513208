//! JSON snapshots of the whole arena.
//!
//! Records are flattened into tables keyed by their identity fields
//! (vault id, `(vault id, user id)` for members, transaction id, proposal id)
//! so the document can be diffed and loaded by other tooling.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use groupvault_core::{AggregateRoot, GovernanceError, UserId, VaultId};
use groupvault_vault::{GroupVault, VaultActionProposal, VaultMember, VaultState, VaultTransaction};

use crate::arena::VaultArena;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot references unknown vault {0}")]
    UnknownVault(VaultId),

    #[error("snapshot lists member {user_id} of vault {vault_id} twice")]
    DuplicateMember { vault_id: VaultId, user_id: UserId },

    #[error("vault {vault_id} is inconsistent: {source}")]
    Inconsistent {
        vault_id: VaultId,
        source: GovernanceError,
    },

    #[error(transparent)]
    State(#[from] GovernanceError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub vaults: Vec<GroupVault>,
    pub members: Vec<VaultMember>,
    pub transactions: Vec<VaultTransaction>,
    pub proposals: Vec<VaultActionProposal>,
    /// Aggregate version per vault, so restored vaults keep numbering events.
    pub versions: BTreeMap<VaultId, u64>,
}

impl ArenaSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl VaultArena {
    pub fn snapshot(&self) -> Result<ArenaSnapshot, SnapshotError> {
        let mut snapshot = ArenaSnapshot::default();
        for state in self.states()? {
            snapshot.versions.insert(state.vault_id(), state.version());
            snapshot.members.extend(state.members().cloned());
            snapshot.transactions.extend(state.transactions().iter().cloned());
            snapshot.proposals.extend(state.proposals().cloned());
            snapshot.vaults.push(state.vault().clone());
        }
        Ok(snapshot)
    }

    /// Build a fresh arena from a snapshot.
    ///
    /// Every vault is checked against the ledger and ownership invariants
    /// before it is admitted; one bad vault fails the whole restore.
    pub fn restore(snapshot: ArenaSnapshot) -> Result<Self, SnapshotError> {
        struct Parts {
            vault: GroupVault,
            members: Vec<VaultMember>,
            transactions: Vec<VaultTransaction>,
            proposals: Vec<VaultActionProposal>,
        }

        let mut parts: HashMap<VaultId, Parts> = snapshot
            .vaults
            .into_iter()
            .map(|vault| {
                (
                    vault.id,
                    Parts {
                        vault,
                        members: Vec::new(),
                        transactions: Vec::new(),
                        proposals: Vec::new(),
                    },
                )
            })
            .collect();

        let mut seen = HashSet::new();
        for m in snapshot.members {
            if !seen.insert(m.key()) {
                return Err(SnapshotError::DuplicateMember {
                    vault_id: m.vault_id,
                    user_id: m.user_id,
                });
            }
            parts
                .get_mut(&m.vault_id)
                .ok_or(SnapshotError::UnknownVault(m.vault_id))?
                .members
                .push(m);
        }
        for t in snapshot.transactions {
            parts
                .get_mut(&t.vault_id)
                .ok_or(SnapshotError::UnknownVault(t.vault_id))?
                .transactions
                .push(t);
        }
        for p in snapshot.proposals {
            parts
                .get_mut(&p.vault_id)
                .ok_or(SnapshotError::UnknownVault(p.vault_id))?
                .proposals
                .push(p);
        }

        let arena = VaultArena::new();
        for (id, p) in parts {
            let version = snapshot.versions.get(&id).copied().unwrap_or(0);
            let state =
                VaultState::from_parts(p.vault, p.members, p.transactions, p.proposals, version);
            state
                .check_invariants()
                .map_err(|source| SnapshotError::Inconsistent { vault_id: id, source })?;
            arena.insert(state)?;
        }

        tracing::info!(vaults = arena.len(), "arena restored from snapshot");
        Ok(arena)
    }
}
