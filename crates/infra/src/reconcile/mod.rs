//! Reconciliation engine: the only writer of stock levels.
//!
//! Orders are applied line by line with atomic per-SKU decrements; external
//! sync tuples are max-merged against the snapshot generation they reference.

mod engine;

pub use engine::{MergeSettings, ReconciliationEngine};

use stockline_events::EventEnvelope;
use stockline_orders::OrderRecord;

/// Bus message carrying a processed order.
pub type OrderEnvelope = EventEnvelope<OrderRecord>;

/// Stream name stamped on order envelopes.
pub const ORDER_STREAM: &str = "orders";
