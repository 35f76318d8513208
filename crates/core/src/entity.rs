//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Vaults, members, transactions and proposals are all entities: two records
/// with the same identity are the same thing, whatever their attributes say.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
