//! Inventory store: per-SKU atomic stock mutations and snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use stockline_core::{DomainError, DomainResult, Generation, Sku};

use crate::product::Product;
use crate::snapshot::InventorySnapshot;

/// Result of an external max-merge attempt on one SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseOutcome {
    /// Quantity was raised to the reported value.
    Raised { from: i64, to: i64 },
    /// Reported value was not above local stock; nothing changed.
    Unchanged { quantity: i64 },
    /// A local reservation happened at or after the observed generation, so
    /// the external value was computed without it.
    Reserved { at: Generation },
    /// The SKU lock could not be taken within the wait budget.
    Busy,
}

/// Stock storage contract.
///
/// Implementations must make `apply_delta` and `raise_to` atomic per SKU and
/// must never serialize mutations of unrelated SKUs behind one lock.
pub trait InventoryStore: Send + Sync {
    /// Add a product to the catalog.
    fn register(&self, product: Product) -> DomainResult<()>;

    fn contains(&self, sku: &Sku) -> bool;

    /// Current quantity for a SKU.
    fn get(&self, sku: &Sku) -> DomainResult<i64>;

    fn product(&self, sku: &Sku) -> DomainResult<Product>;

    /// All products, sorted by SKU.
    fn list(&self) -> Vec<Product>;

    /// Atomically add `delta` to the stock of `sku`, returning the new quantity.
    ///
    /// Fails with `InsufficientStock` (leaving stock untouched) if the result
    /// would be negative. Negative deltas record a local reservation stamped
    /// with the current generation.
    fn apply_delta(&self, sku: &Sku, delta: i64) -> DomainResult<i64>;

    /// Raise stock to `reported` if it is higher, unless a reservation was
    /// recorded at or after `observed`. Waits at most `wait` for the SKU lock.
    fn raise_to(
        &self,
        sku: &Sku,
        reported: i64,
        observed: Generation,
        wait: Duration,
    ) -> DomainResult<RaiseOutcome>;

    fn snapshot(&self) -> InventorySnapshot;

    fn generation(&self) -> Generation;

    /// Start a new snapshot generation, returning it.
    fn advance_generation(&self) -> Generation;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn register(&self, product: Product) -> DomainResult<()> {
        (**self).register(product)
    }

    fn contains(&self, sku: &Sku) -> bool {
        (**self).contains(sku)
    }

    fn get(&self, sku: &Sku) -> DomainResult<i64> {
        (**self).get(sku)
    }

    fn product(&self, sku: &Sku) -> DomainResult<Product> {
        (**self).product(sku)
    }

    fn list(&self) -> Vec<Product> {
        (**self).list()
    }

    fn apply_delta(&self, sku: &Sku, delta: i64) -> DomainResult<i64> {
        (**self).apply_delta(sku, delta)
    }

    fn raise_to(
        &self,
        sku: &Sku,
        reported: i64,
        observed: Generation,
        wait: Duration,
    ) -> DomainResult<RaiseOutcome> {
        (**self).raise_to(sku, reported, observed, wait)
    }

    fn snapshot(&self) -> InventorySnapshot {
        (**self).snapshot()
    }

    fn generation(&self) -> Generation {
        (**self).generation()
    }

    fn advance_generation(&self) -> Generation {
        (**self).advance_generation()
    }
}

#[derive(Debug)]
struct Slot {
    product: Product,
    /// Generation current when the latest local reservation was applied.
    reserved_at: Option<Generation>,
}

/// In-memory store with one lock per SKU.
///
/// The SKU map is write-locked only by `register`; quantity changes take the
/// map read lock just long enough to clone the slot handle.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    slots: RwLock<HashMap<Sku, Arc<Mutex<Slot>>>>,
    generation: AtomicU64,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `products` at generation zero.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> DomainResult<Self> {
        let store = Self::new();
        for product in products {
            store.register(product)?;
        }
        Ok(store)
    }

    fn slot(&self, sku: &Sku) -> DomainResult<Arc<Mutex<Slot>>> {
        self.slots
            .read()
            .get(sku)
            .cloned()
            .ok_or_else(|| DomainError::not_found(sku))
    }

    fn all_slots(&self) -> Vec<Arc<Mutex<Slot>>> {
        self.slots.read().values().cloned().collect()
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn register(&self, product: Product) -> DomainResult<()> {
        let mut slots = self.slots.write();
        if slots.contains_key(product.sku()) {
            return Err(DomainError::conflict(format!(
                "product {} already registered",
                product.sku()
            )));
        }
        slots.insert(
            product.sku().clone(),
            Arc::new(Mutex::new(Slot {
                product,
                reserved_at: None,
            })),
        );
        Ok(())
    }

    fn contains(&self, sku: &Sku) -> bool {
        self.slots.read().contains_key(sku)
    }

    fn get(&self, sku: &Sku) -> DomainResult<i64> {
        let slot = self.slot(sku)?;
        let quantity = slot.lock().product.quantity();
        Ok(quantity)
    }

    fn product(&self, sku: &Sku) -> DomainResult<Product> {
        let slot = self.slot(sku)?;
        let product = slot.lock().product.clone();
        Ok(product)
    }

    fn list(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .all_slots()
            .iter()
            .map(|slot| slot.lock().product.clone())
            .collect();
        products.sort_by(|a, b| a.sku().cmp(b.sku()));
        products
    }

    fn apply_delta(&self, sku: &Sku, delta: i64) -> DomainResult<i64> {
        if delta == 0 {
            return Err(DomainError::invalid("delta cannot be zero"));
        }

        let slot = self.slot(sku)?;
        let mut slot = slot.lock();

        let available = slot.product.quantity();
        let next = available
            .checked_add(delta)
            .ok_or_else(|| DomainError::invalid("quantity overflow"))?;
        if next < 0 {
            return Err(DomainError::InsufficientStock {
                sku: sku.clone(),
                requested: -delta,
                available,
            });
        }

        slot.product.set_quantity(next);
        if delta < 0 {
            // Read under the SKU lock: a snapshot that saw an older generation
            // cannot have observed this decrement.
            slot.reserved_at = Some(self.generation());
        }
        Ok(next)
    }

    fn raise_to(
        &self,
        sku: &Sku,
        reported: i64,
        observed: Generation,
        wait: Duration,
    ) -> DomainResult<RaiseOutcome> {
        if reported < 0 {
            return Err(DomainError::invalid("reported quantity cannot be negative"));
        }

        let slot = self.slot(sku)?;
        let Some(mut slot) = slot.try_lock_for(wait) else {
            return Ok(RaiseOutcome::Busy);
        };

        let local = slot.product.quantity();
        if reported <= local {
            return Ok(RaiseOutcome::Unchanged { quantity: local });
        }
        if let Some(at) = slot.reserved_at {
            if at >= observed {
                return Ok(RaiseOutcome::Reserved { at });
            }
        }

        slot.product.set_quantity(reported);
        Ok(RaiseOutcome::Raised {
            from: local,
            to: reported,
        })
    }

    fn snapshot(&self) -> InventorySnapshot {
        // Generation first: anything applied after this read is either visible
        // in the quantities or stamped with a generation >= this one.
        let generation = self.generation();
        let quantities: BTreeMap<Sku, i64> = self
            .all_slots()
            .iter()
            .map(|slot| {
                let slot = slot.lock();
                (slot.product.sku().clone(), slot.product.quantity())
            })
            .collect();
        InventorySnapshot::new(generation, Utc::now(), quantities)
    }

    fn generation(&self) -> Generation {
        Generation::new(self.generation.load(Ordering::SeqCst))
    }

    fn advance_generation(&self) -> Generation {
        Generation::new(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
