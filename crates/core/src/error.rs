//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the governance layer.
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Governance-level error.
///
/// Every failure is scoped to the single requested operation and returned to
/// the caller as a value; nothing here is fatal to the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// The caller lacks the capability required for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The vault has been deactivated; balance-affecting operations are refused.
    #[error("vault is inactive")]
    VaultInactive,

    /// A withdrawal would take the balance below zero.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Decimal, available: Decimal },

    /// A per-member contribution or withdrawal cap would be exceeded.
    #[error("limit exceeded: requested {requested}, limit {limit}")]
    LimitExceeded { requested: Decimal, limit: Decimal },

    /// The operation would leave the vault without an active Owner.
    #[error("the vault's last owner cannot be removed or demoted")]
    LastOwnerProtected,

    /// The voter has already voted in the current round.
    #[error("member has already voted on this proposal")]
    AlreadyVoted,

    /// The proposal no longer accepts votes or appeals.
    #[error("proposal is closed")]
    ProposalClosed,

    /// The proposal (or its appeal re-vote) ran out of time.
    #[error("proposal has expired")]
    ProposalExpired,

    /// The appeal window of a resolved proposal has passed.
    #[error("appeal window has closed")]
    AppealWindowClosed,

    /// The caller or target is not an active member of the vault.
    #[error("not a member of this vault")]
    NotAMember,

    /// A requested resource does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Input failed validation (e.g. non-positive amount).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Shared state could not be accessed (poisoned lock).
    #[error("vault state unavailable: {0}")]
    StateUnavailable(String),
}

impl GovernanceError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StateUnavailable(msg.into())
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }

    /// Stable, machine-readable error code (used by transport layers).
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::VaultInactive => "vault_inactive",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::LastOwnerProtected => "last_owner_protected",
            Self::AlreadyVoted => "already_voted",
            Self::ProposalClosed => "proposal_closed",
            Self::ProposalExpired => "proposal_expired",
            Self::AppealWindowClosed => "appeal_window_closed",
            Self::NotAMember => "not_a_member",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::StateUnavailable(_) => "state_unavailable",
        }
    }
}
