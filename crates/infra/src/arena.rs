//! In-process vault storage.
//!
//! One `RwLock` per vault: operations on different vaults never contend,
//! operations on the same vault are serialized by its write lock. The outer
//! map lock is held only long enough to clone a vault handle.
//!
//! Lock order is always outer map, then vault, then proposal index. The
//! outer lock is released before a vault lock is taken.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use groupvault_core::{GovernanceError, GovernanceResult, ProposalId, VaultId};
use groupvault_vault::{GovernanceEvent, VaultState};

pub type VaultHandle = Arc<RwLock<VaultState>>;

/// Result of a mutation plus the notifications it queued.
///
/// Events are returned even when the operation failed: a lazy transition
/// (for example expiring a proposal before refusing a vote) may have been
/// applied before the error.
#[derive(Debug)]
pub struct Committed<R> {
    pub vault_id: VaultId,
    pub outcome: GovernanceResult<R>,
    pub events: Vec<(u64, GovernanceEvent)>,
}

#[derive(Debug, Default)]
pub struct VaultArena {
    vaults: RwLock<HashMap<VaultId, VaultHandle>>,
    proposal_index: RwLock<HashMap<ProposalId, VaultId>>,
}

fn poisoned(what: &str) -> GovernanceError {
    GovernanceError::unavailable(format!("{what} lock poisoned"))
}

impl VaultArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vault state (new or restored) and index its proposals.
    pub fn insert(&self, state: VaultState) -> GovernanceResult<VaultId> {
        let vault_id = state.vault_id();
        let proposal_ids: Vec<ProposalId> = state.proposals().map(|p| p.id).collect();

        {
            let mut vaults = self.vaults.write().map_err(|_| poisoned("arena"))?;
            if vaults.contains_key(&vault_id) {
                return Err(GovernanceError::validation(format!(
                    "vault {vault_id} already exists"
                )));
            }
            vaults.insert(vault_id, Arc::new(RwLock::new(state)));
        }

        let mut index = self.proposal_index.write().map_err(|_| poisoned("proposal index"))?;
        for id in proposal_ids {
            index.insert(id, vault_id);
        }
        Ok(vault_id)
    }

    pub fn handle(&self, vault_id: VaultId) -> GovernanceResult<VaultHandle> {
        let vaults = self.vaults.read().map_err(|_| poisoned("arena"))?;
        vaults
            .get(&vault_id)
            .cloned()
            .ok_or(GovernanceError::not_found("vault"))
    }

    /// Which vault a proposal belongs to.
    pub fn vault_of(&self, proposal_id: ProposalId) -> GovernanceResult<VaultId> {
        let index = self.proposal_index.read().map_err(|_| poisoned("proposal index"))?;
        index
            .get(&proposal_id)
            .copied()
            .ok_or(GovernanceError::not_found("proposal"))
    }

    pub fn vault_ids(&self) -> GovernanceResult<Vec<VaultId>> {
        let vaults = self.vaults.read().map_err(|_| poisoned("arena"))?;
        let mut ids: Vec<VaultId> = vaults.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn len(&self) -> usize {
        self.vaults.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against a shared view of one vault.
    pub fn with_vault<R>(
        &self,
        vault_id: VaultId,
        f: impl FnOnce(&VaultState) -> R,
    ) -> GovernanceResult<R> {
        let handle = self.handle(vault_id)?;
        let state = handle.read().map_err(|_| poisoned("vault"))?;
        Ok(f(&state))
    }

    /// Run `f` under the vault's exclusive lock and drain its notifications.
    ///
    /// The outer `Err` is reserved for storage failures (unknown vault,
    /// poisoned lock); domain failures land in [`Committed::outcome`].
    pub fn with_vault_mut<R>(
        &self,
        vault_id: VaultId,
        f: impl FnOnce(&mut VaultState) -> GovernanceResult<R>,
    ) -> GovernanceResult<Committed<R>> {
        let handle = self.handle(vault_id)?;
        let mut state = handle.write().map_err(|_| poisoned("vault"))?;

        let outcome = f(&mut state);
        let events = state.take_events();

        let created: Vec<ProposalId> = events
            .iter()
            .filter_map(|(_, e)| match e {
                GovernanceEvent::ProposalCreated { proposal_id, .. } => Some(*proposal_id),
                _ => None,
            })
            .collect();
        if !created.is_empty() {
            let mut index = self.proposal_index.write().map_err(|_| poisoned("proposal index"))?;
            for id in created {
                index.insert(id, vault_id);
            }
        }

        Ok(Committed {
            vault_id,
            outcome,
            events,
        })
    }

    /// Clone every vault state, in id order.
    pub fn states(&self) -> GovernanceResult<Vec<VaultState>> {
        let handles: Vec<(VaultId, VaultHandle)> = {
            let vaults = self.vaults.read().map_err(|_| poisoned("arena"))?;
            vaults.iter().map(|(id, h)| (*id, h.clone())).collect()
        };

        let mut states = Vec::with_capacity(handles.len());
        for (_, handle) in handles {
            let state = handle.read().map_err(|_| poisoned("vault"))?;
            states.push(state.clone());
        }
        states.sort_by_key(|s| s.vault_id());
        Ok(states)
    }
}
