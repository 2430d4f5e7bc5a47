use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, Sku};

/// A stocked product.
///
/// Quantity is never negative; the store enforces this on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    sku: Sku,
    name: String,
    unit: String,
    quantity: i64,
}

impl Product {
    pub fn new(
        sku: Sku,
        name: impl Into<String>,
        unit: impl Into<String>,
        quantity: i64,
    ) -> DomainResult<Self> {
        let name = name.into();
        let unit = unit.into();
        if name.trim().is_empty() {
            return Err(DomainError::invalid("product name cannot be empty"));
        }
        if unit.trim().is_empty() {
            return Err(DomainError::invalid("unit of measure cannot be empty"));
        }
        if quantity < 0 {
            return Err(DomainError::invalid("quantity cannot be negative"));
        }
        Ok(Self {
            sku,
            name,
            unit,
            quantity,
        })
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub(crate) fn set_quantity(&mut self, quantity: i64) {
        debug_assert!(quantity >= 0);
        self.quantity = quantity;
    }
}

impl Entity for Product {
    type Id = Sku;

    fn id(&self) -> &Self::Id {
        &self.sku
    }
}
