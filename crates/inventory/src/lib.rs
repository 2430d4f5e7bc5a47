//! Inventory domain module.
//!
//! Holds current stock per SKU and is the single source of truth for product
//! quantities. Mutations are atomic per SKU; unrelated SKUs never contend.

pub mod product;
pub mod snapshot;
pub mod store;

pub use product::Product;
pub use snapshot::InventorySnapshot;
pub use store::{InMemoryInventoryStore, InventoryStore, RaiseOutcome};
