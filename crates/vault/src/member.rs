use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use groupvault_auth::{Capability, MemberGrants, Role};
use groupvault_core::{UserId, VaultId};

/// A user's membership in one vault.
///
/// Identity is `(vault_id, user_id)`. Members are deactivated, never deleted,
/// so past transactions and votes keep pointing at a real record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMember {
    pub vault_id: VaultId,
    pub user_id: UserId,
    pub role: Role,
    /// Explicit grants on top of the role defaults.
    pub permissions: BTreeSet<Capability>,
    /// Per-deposit cap; `None` means unlimited.
    pub contribution_limit: Option<Decimal>,
    /// Per-withdrawal cap; `None` means unlimited.
    pub withdrawal_limit: Option<Decimal>,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl VaultMember {
    pub fn new(vault_id: VaultId, user_id: UserId, role: Role, joined_at: DateTime<Utc>) -> Self {
        Self {
            vault_id,
            user_id,
            role,
            permissions: BTreeSet::new(),
            contribution_limit: None,
            withdrawal_limit: None,
            is_active: true,
            joined_at,
            left_at: None,
        }
    }

    pub fn key(&self) -> (VaultId, UserId) {
        (self.vault_id, self.user_id)
    }

    pub fn grants(&self) -> MemberGrants<'_> {
        MemberGrants::new(self.role, &self.permissions, self.is_active)
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.grants().has(capability)
    }

    pub fn is_active_owner(&self) -> bool {
        self.is_active && self.role == Role::Owner
    }
}
