//! `groupvault-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, money amounts, the error taxonomy and a clock abstraction.

pub mod aggregate;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::AggregateRoot;
pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{GovernanceError, GovernanceResult};
pub use id::{ProposalId, TransactionId, UserId, VaultId};
pub use money::{Amount, ValueObject};
