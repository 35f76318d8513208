use serde::{Deserialize, Serialize};

/// Fine-grained capability tag checked before any vault operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CanDeposit,
    CanPropose,
    CanVote,
    CanWithdraw,
    /// Add members directly, without a proposal.
    CanInvite,
    /// Adjust other members' limits.
    CanManageMembers,
    CanDeleteVault,
    CanTransferOwnership,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::CanDeposit,
        Capability::CanPropose,
        Capability::CanVote,
        Capability::CanWithdraw,
        Capability::CanInvite,
        Capability::CanManageMembers,
        Capability::CanDeleteVault,
        Capability::CanTransferOwnership,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CanDeposit => "can_deposit",
            Capability::CanPropose => "can_propose",
            Capability::CanVote => "can_vote",
            Capability::CanWithdraw => "can_withdraw",
            Capability::CanInvite => "can_invite",
            Capability::CanManageMembers => "can_manage_members",
            Capability::CanDeleteVault => "can_delete_vault",
            Capability::CanTransferOwnership => "can_transfer_ownership",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Capability::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Capabilities that only the Owner may ever hold; explicit grants to
    /// other roles are ignored.
    pub fn is_owner_only(&self) -> bool {
        matches!(
            self,
            Capability::CanDeleteVault | Capability::CanTransferOwnership
        )
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
