//! Infrastructure layer: vault storage, configuration, snapshots.

pub mod arena;
pub mod config;
pub mod snapshot;

pub use arena::{Committed, VaultArena, VaultHandle};
pub use config::{AppConfig, ConfigError};
pub use snapshot::{ArenaSnapshot, SnapshotError};
