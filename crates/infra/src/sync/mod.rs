//! External inventory sync: update tuples, merge reports, the deferred
//! queue, source adapters and the background scheduler.

pub mod queue;
pub mod scheduler;
pub mod source;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockline_core::{DomainResult, Generation, Sku};
use stockline_inventory::InventorySnapshot;

pub use queue::{DeferredUpdate, SyncQueue};
pub use scheduler::{SyncCycle, SyncError, SyncScheduler};
pub use source::{ExternalInventorySource, HttpInventorySource, NullSource, SourceError};

/// One quantity reported by an external source.
///
/// `snapshot` is the generation the source last observed from us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUpdate {
    pub sku: Sku,
    pub quantity: i64,
    pub snapshot: Generation,
}

impl ExternalUpdate {
    pub fn new(sku: Sku, quantity: i64, snapshot: Generation) -> Self {
        Self {
            sku,
            quantity,
            snapshot,
        }
    }
}

/// What merging one tuple did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MergeResult {
    Applied { from: i64, to: i64 },
    Unchanged { quantity: i64 },
    /// A local reservation is newer than the tuple's reference; queued.
    Deferred { reserved_at: Generation },
    /// Reference too old; a full resync is needed.
    Stale { current: Generation },
    /// Unknown SKU or malformed tuple.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub sku: Sku,
    pub reported: i64,
    pub snapshot: Generation,
    #[serde(flatten)]
    pub result: MergeResult,
}

/// Outcome of one merge batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Store generation once the batch finished.
    pub generation: Generation,
    pub entries: Vec<SyncEntry>,
}

impl SyncReport {
    pub(crate) fn record(&mut self, update: ExternalUpdate, result: MergeResult) {
        self.entries.push(SyncEntry {
            sku: update.sku,
            reported: update.quantity,
            snapshot: update.snapshot,
            result,
        });
    }

    fn count(&self, pred: impl Fn(&MergeResult) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.result)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|r| matches!(r, MergeResult::Applied { .. }))
    }

    pub fn deferred(&self) -> usize {
        self.count(|r| matches!(r, MergeResult::Deferred { .. }))
    }

    pub fn stale(&self) -> usize {
        self.count(|r| matches!(r, MergeResult::Stale { .. }))
    }

    pub fn rejected(&self) -> usize {
        self.count(|r| matches!(r, MergeResult::Rejected { .. }))
    }

    /// The source must send a full resync against a fresh snapshot.
    pub fn requires_resync(&self) -> bool {
        self.stale() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The merge side of the reconciliation engine, as seen by the scheduler.
pub trait InventorySync: Send + Sync {
    fn merge_batch(&self, updates: Vec<ExternalUpdate>) -> DomainResult<SyncReport>;

    /// Re-merge tuples deferred by earlier batches.
    fn retry_deferred(&self) -> DomainResult<SyncReport>;

    fn snapshot(&self) -> InventorySnapshot;
}

impl<T> InventorySync for Arc<T>
where
    T: InventorySync + ?Sized,
{
    fn merge_batch(&self, updates: Vec<ExternalUpdate>) -> DomainResult<SyncReport> {
        (**self).merge_batch(updates)
    }

    fn retry_deferred(&self) -> DomainResult<SyncReport> {
        (**self).retry_deferred()
    }

    fn snapshot(&self) -> InventorySnapshot {
        (**self).snapshot()
    }
}
