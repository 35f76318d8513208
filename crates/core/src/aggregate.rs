//! Aggregate root trait for consistency boundaries.

/// Aggregate root marker + minimal interface.
///
/// A group vault is the consistency boundary of this system: balance,
/// membership and open proposals change together under a single lock.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Incremented once per accepted mutation, so two snapshots of the same
    /// aggregate can be ordered.
    fn version(&self) -> u64;
}
