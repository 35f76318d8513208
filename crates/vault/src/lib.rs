//! Group vault domain (balance ledger + membership + collective decisions).
//!
//! Pure domain logic only: no IO, no locking, no transport. A [`VaultState`]
//! is one vault's complete mutable state; every operation here assumes the
//! caller already holds that vault's exclusive lock.

pub mod appeal;
pub mod events;
pub mod ledger;
pub mod member;
pub mod membership;
pub mod policy;
pub mod proposal;
pub mod state;
pub mod transaction;
pub mod vault;

pub use appeal::{Appeal, AppealOutcome};
pub use events::GovernanceEvent;
pub use member::VaultMember;
pub use policy::{AppealEligibility, Decision, GovernancePolicy, Tally};
pub use proposal::{ActionRequest, ActionType, ExecutionRecord, ProposalStatus, ProposedAction, VaultActionProposal};
pub use state::VaultState;
pub use transaction::{TransactionStatus, TransactionType, VaultTransaction};
pub use vault::{GroupVault, NewVault, VaultType};
