//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Order line items
/// and inventory snapshots are value objects: once built they are never
/// modified, a changed value is a new object.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
