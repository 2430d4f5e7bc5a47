use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{Generation, Sku, ValueObject};

/// Versioned view of every product quantity at one point in time.
///
/// External sources reference a snapshot's generation when they report
/// quantities back, which is how stale or conflicting updates are detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    generation: Generation,
    taken_at: DateTime<Utc>,
    quantities: BTreeMap<Sku, i64>,
}

impl InventorySnapshot {
    pub fn new(
        generation: Generation,
        taken_at: DateTime<Utc>,
        quantities: BTreeMap<Sku, i64>,
    ) -> Self {
        Self {
            generation,
            taken_at,
            quantities,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn quantity(&self, sku: &Sku) -> Option<i64> {
        self.quantities.get(sku).copied()
    }

    pub fn quantities(&self) -> &BTreeMap<Sku, i64> {
        &self.quantities
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}

impl ValueObject for InventorySnapshot {}
