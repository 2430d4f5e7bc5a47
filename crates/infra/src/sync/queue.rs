use std::collections::BTreeMap;

use parking_lot::Mutex;

use stockline_core::{Generation, Sku};

use super::ExternalUpdate;

/// A queued tuple and the generation it was deferred at.
///
/// On retry, only reservations stamped at or after `deferred_at` hold the
/// tuple back again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredUpdate {
    pub update: ExternalUpdate,
    pub deferred_at: Generation,
}

/// Deferred sync tuples, at most one per SKU.
///
/// A tuple referencing a newer snapshot replaces a queued older one; an older
/// tuple never replaces a newer one.
#[derive(Debug, Default)]
pub struct SyncQueue {
    pending: Mutex<BTreeMap<Sku, DeferredUpdate>>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `update` as deferred at `deferred_at`. Returns `false` if a newer
    /// tuple is already queued.
    pub fn push(&self, update: ExternalUpdate, deferred_at: Generation) -> bool {
        let mut pending = self.pending.lock();
        match pending.get(&update.sku) {
            Some(queued) if queued.update.snapshot > update.snapshot => false,
            _ => {
                pending.insert(
                    update.sku.clone(),
                    DeferredUpdate {
                        update,
                        deferred_at,
                    },
                );
                true
            }
        }
    }

    /// Drop the queued tuple for the same SKU if `merged` is at least as new.
    pub fn supersede(&self, merged: &ExternalUpdate) {
        let mut pending = self.pending.lock();
        if pending
            .get(&merged.sku)
            .is_some_and(|queued| queued.update.snapshot <= merged.snapshot)
        {
            pending.remove(&merged.sku);
        }
    }

    /// Take every queued tuple, in SKU order.
    pub fn drain(&self) -> Vec<DeferredUpdate> {
        std::mem::take(&mut *self.pending.lock())
            .into_values()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
