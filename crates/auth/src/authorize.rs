use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::{Capability, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("membership is inactive")]
    Inactive,

    #[error("forbidden: missing capability '{0}'")]
    Forbidden(Capability),
}

/// Role → capability lookup table.
///
/// Each role's set is a superset of the role below it. Owner-only capabilities
/// are irrevocable for the Owner and unreachable for everybody else.
pub fn role_grants(role: Role, capability: Capability) -> bool {
    use Capability::*;

    match role {
        Role::Owner => true,
        Role::Admin => matches!(
            capability,
            CanDeposit | CanPropose | CanVote | CanWithdraw | CanInvite | CanManageMembers
        ),
        Role::Member => matches!(capability, CanDeposit | CanPropose | CanVote),
    }
}

/// The authorization-relevant view of one vault member.
#[derive(Debug, Clone, Copy)]
pub struct MemberGrants<'a> {
    pub role: Role,
    /// Extra capabilities granted on top of the role defaults.
    pub explicit: &'a BTreeSet<Capability>,
    pub active: bool,
}

impl<'a> MemberGrants<'a> {
    pub fn new(role: Role, explicit: &'a BTreeSet<Capability>, active: bool) -> Self {
        Self {
            role,
            explicit,
            active,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        if !self.active {
            return false;
        }
        if role_grants(self.role, capability) {
            return true;
        }
        !capability.is_owner_only() && self.explicit.contains(&capability)
    }

    /// Every capability this member currently holds, in declaration order.
    pub fn effective(&self) -> Vec<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| self.has(*c))
            .collect()
    }
}

/// Authorize a member for a single capability.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(member: &MemberGrants<'_>, required: Capability) -> Result<(), AuthzError> {
    if !member.active {
        return Err(AuthzError::Inactive);
    }
    if member.has(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required: Capability,
    pub granted: bool,
    pub role: Role,
    pub effective: Vec<Capability>,
    /// Which source granted the capability ("role" or "explicit"), if granted.
    pub granted_by: Option<&'static str>,
    pub reason: String,
}

/// Explain why an authorization decision was made (or would be made).
pub fn explain_authorization(
    member: &MemberGrants<'_>,
    required: Capability,
) -> AuthorizationExplanation {
    let effective = member.effective();

    let (granted, granted_by, reason) = if !member.active {
        (false, None, "membership is inactive".to_string())
    } else if role_grants(member.role, required) {
        (
            true,
            Some("role"),
            format!("role '{}' grants '{}'", member.role, required),
        )
    } else if member.has(required) {
        (
            true,
            Some("explicit"),
            format!("'{required}' was granted explicitly"),
        )
    } else if required.is_owner_only() {
        (
            false,
            None,
            format!("'{required}' is reserved for the vault owner"),
        )
    } else {
        (
            false,
            None,
            format!("role '{}' does not grant '{}'", member.role, required),
        )
    };

    AuthorizationExplanation {
        required,
        granted,
        role: member.role,
        effective,
        granted_by,
        reason,
    }
}
