//! Vault governance facade: the only externally callable surface.
//!
//! Every operation resolves the caller's membership and capabilities, runs
//! under the target vault's exclusive lock, and publishes the resulting
//! notifications after the lock is released.

pub mod facade;
pub mod views;

pub use facade::{GovernanceFacade, NotificationBus};
pub use views::{InviteOutcome, VaultDetails, VaultSummary};
