//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Products are entities keyed by their SKU: two products with the same SKU
/// are the same product even when their quantities differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
