//! `stockline-core` : domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error taxonomy shared by every layer and the strongly-typed identifiers
//! (SKU, order id, snapshot generation).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{Generation, OrderId, Sku};
pub use value_object::ValueObject;
