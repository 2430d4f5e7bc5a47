use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use stockline_core::{DomainError, DomainResult, Generation, OrderId};
use stockline_events::{EventBus, EventEnvelope};
use stockline_inventory::{InventorySnapshot, InventoryStore, RaiseOutcome};
use stockline_orders::{
    LineOutcome, OrderRecord, OrderRequest, OrderValidator, RejectReason, ValidatedIntent,
};

use super::{ORDER_STREAM, OrderEnvelope};
use crate::order_log::OrderLog;
use crate::retry::RetryPolicy;
use crate::sync::{
    DeferredUpdate, ExternalUpdate, InventorySync, MergeResult, SyncQueue, SyncReport,
};

/// Tuning for external merges.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSettings {
    /// Deadline for one batch (or one deferred-queue retry).
    pub timeout: Duration,
    /// How long a single `raise_to` waits for the SKU lock.
    pub lock_wait: Duration,
    /// Backoff between `Busy` retries; bounded by the deadline, not attempts.
    pub backoff: RetryPolicy,
    /// A reference this many generations behind current is stale.
    pub stale_after: u64,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            lock_wait: Duration::from_millis(20),
            backoff: RetryPolicy::exponential(
                u32::MAX,
                Duration::from_millis(5),
                Duration::from_millis(200),
            ),
            stale_after: 2,
        }
    }
}

/// Applies orders and external updates to the inventory store.
///
/// Every processed order is appended to the order log and then published on
/// the bus, both under one lock so consumers see records in production order.
pub struct ReconciliationEngine<S, L, B> {
    store: S,
    validator: OrderValidator<S>,
    log: L,
    bus: B,
    /// Last published sequence number.
    sequence: Mutex<u64>,
    deferred: SyncQueue,
    settings: MergeSettings,
}

impl<S, L, B> ReconciliationEngine<S, L, B>
where
    S: InventoryStore + Clone,
    L: OrderLog,
    B: EventBus<OrderEnvelope>,
{
    pub fn new(store: S, log: L, bus: B) -> Self {
        Self::with_settings(store, log, bus, MergeSettings::default())
    }

    pub fn with_settings(store: S, log: L, bus: B, settings: MergeSettings) -> Self {
        Self {
            validator: OrderValidator::new(store.clone()),
            store,
            log,
            bus,
            sequence: Mutex::new(0),
            deferred: SyncQueue::new(),
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Tuples waiting for the next sync cycle.
    pub fn deferred(&self) -> &SyncQueue {
        &self.deferred
    }

    /// Validate `request`, then reconcile it.
    pub fn process(
        &self,
        request: OrderRequest,
        cancel: &CancellationToken,
    ) -> DomainResult<OrderRecord> {
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }
        let intent = self.validator.validate(request)?;
        self.reconcile(intent, cancel)
    }

    /// Apply each line of `intent` with an atomic decrement.
    ///
    /// Lines that would oversell are rejected while the rest commit. The
    /// validator's feasibility tag is ignored here; only the decrement decides.
    /// Cancellation is honoured until the first line commits.
    pub fn reconcile(
        &self,
        intent: ValidatedIntent,
        cancel: &CancellationToken,
    ) -> DomainResult<OrderRecord> {
        let id = OrderId::new();
        let span = info_span!("reconcile", order_id = %id);
        let _enter = span.enter();

        let mut outcomes = Vec::with_capacity(intent.lines().len());
        let mut committed = 0usize;

        for line in intent.lines() {
            if committed == 0 && cancel.is_cancelled() {
                info!("order cancelled before any line committed");
                return Err(DomainError::Cancelled);
            }

            match self.store.apply_delta(&line.sku, -line.requested) {
                Ok(remaining) => {
                    committed += 1;
                    outcomes.push(LineOutcome::accepted(
                        line.sku.clone(),
                        line.requested,
                        remaining,
                    ));
                }
                Err(DomainError::InsufficientStock { available, .. }) => {
                    debug!(sku = %line.sku, requested = line.requested, available, "line rejected");
                    outcomes.push(LineOutcome::rejected(
                        line.sku.clone(),
                        line.requested,
                        RejectReason::InsufficientStock { available },
                    ));
                }
                Err(err) if committed == 0 => return Err(err),
                Err(err) => {
                    warn!(sku = %line.sku, error = %err, "line failed after partial commit");
                    outcomes.push(LineOutcome::rejected(
                        line.sku.clone(),
                        line.requested,
                        RejectReason::Unavailable {
                            detail: err.to_string(),
                        },
                    ));
                }
            }
        }

        let generation = if committed > 0 {
            self.store.advance_generation()
        } else {
            self.store.generation()
        };

        let record = OrderRecord::new(id, intent.request(), outcomes, generation);
        info!(
            status = record.status().as_str(),
            lines = record.lines().len(),
            committed,
            %generation,
            "order reconciled"
        );

        self.publish(record.clone());
        Ok(record)
    }

    fn publish(&self, record: OrderRecord) {
        let mut sequence = self.sequence.lock();

        if let Err(err) = self.log.append(record.clone()) {
            error!(order_id = %record.id(), error = %err, "failed to append order record");
        }

        *sequence += 1;
        let correlation_id = *record.id().as_uuid();
        let envelope = EventEnvelope::wrap(ORDER_STREAM, *sequence, correlation_id, record);
        if let Err(err) = self.bus.publish(envelope) {
            warn!(sequence = *sequence, error = ?err, "failed to publish order record");
        }
    }

    /// Merge one external tuple, retrying `Busy` until `deadline`.
    ///
    /// Deferred tuples are queued for the next cycle; an applied or unchanged
    /// tuple clears any older queued tuple for its SKU.
    pub fn merge_update(
        &self,
        update: &ExternalUpdate,
        deadline: Instant,
    ) -> DomainResult<MergeResult> {
        self.merge_since(update, update.snapshot, deadline)
    }

    /// Merge `update`, holding it back only for reservations stamped at or
    /// after `since`. Staleness is always judged on the tuple's own snapshot.
    fn merge_since(
        &self,
        update: &ExternalUpdate,
        since: Generation,
        deadline: Instant,
    ) -> DomainResult<MergeResult> {
        let current = self.store.generation();
        if update.snapshot > current {
            return Err(DomainError::invalid(format!(
                "update for {} references future generation {} (current {})",
                update.sku, update.snapshot, current
            )));
        }
        if update.snapshot.lag_behind(current) >= self.settings.stale_after {
            return Err(DomainError::StaleSnapshot {
                reference: update.snapshot,
                current,
            });
        }

        let mut attempt = 0u32;
        let result = loop {
            let outcome = self.store.raise_to(
                &update.sku,
                update.quantity,
                since,
                self.settings.lock_wait,
            )?;
            match outcome {
                RaiseOutcome::Raised { from, to } => break MergeResult::Applied { from, to },
                RaiseOutcome::Unchanged { quantity } => break MergeResult::Unchanged { quantity },
                RaiseOutcome::Reserved { at } => break MergeResult::Deferred { reserved_at: at },
                RaiseOutcome::Busy => {
                    attempt = attempt.saturating_add(1);
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DomainError::SyncTimeout(self.settings.timeout));
                    }
                    let delay = self.settings.backoff.delay_for_attempt(attempt);
                    debug!(sku = %update.sku, attempt, ?delay, "sku busy, backing off");
                    thread::sleep(delay.min(deadline - now));
                }
            }
        };

        match &result {
            MergeResult::Deferred { reserved_at } => {
                let deferred_at = self.store.generation();
                debug!(
                    sku = %update.sku,
                    %reserved_at,
                    %deferred_at,
                    "update deferred behind local reservation"
                );
                self.deferred.push(update.clone(), deferred_at);
            }
            _ => self.deferred.supersede(update),
        }
        Ok(result)
    }

    /// Merge `updates` against current stock with one deadline for the batch.
    ///
    /// Stale and unknown-SKU tuples are reported per entry. On timeout the
    /// unmerged tuples are queued and `SyncTimeout` is returned.
    pub fn merge_batch(&self, updates: Vec<ExternalUpdate>) -> DomainResult<SyncReport> {
        let deadline = Instant::now() + self.settings.timeout;
        let pending = updates
            .into_iter()
            .map(|update| DeferredUpdate {
                deferred_at: update.snapshot,
                update,
            })
            .collect();
        self.merge_all(pending, deadline, false)
    }

    /// Drain the deferred queue and merge it again.
    ///
    /// A queued tuple applies unless a reservation happened since it was
    /// deferred. Tuples that went stale meanwhile are dropped.
    pub fn retry_deferred(&self) -> DomainResult<SyncReport> {
        let pending = self.deferred.drain();
        if pending.is_empty() {
            return Ok(SyncReport {
                generation: self.store.generation(),
                entries: Vec::new(),
            });
        }
        debug!(pending = pending.len(), "retrying deferred sync updates");
        let deadline = Instant::now() + self.settings.timeout;
        self.merge_all(pending, deadline, true)
    }

    fn merge_all(
        &self,
        pending: Vec<DeferredUpdate>,
        deadline: Instant,
        from_queue: bool,
    ) -> DomainResult<SyncReport> {
        let mut report = SyncReport::default();
        let mut remaining = pending.into_iter();

        while let Some(DeferredUpdate {
            update,
            deferred_at,
        }) = remaining.next()
        {
            match self.merge_since(&update, deferred_at, deadline) {
                Ok(result) => report.record(update, result),
                Err(DomainError::StaleSnapshot { reference, current }) => {
                    if from_queue {
                        warn!(sku = %update.sku, %reference, %current, "dropping stale deferred update");
                    }
                    report.record(update, MergeResult::Stale { current });
                }
                Err(err @ (DomainError::NotFound(_) | DomainError::InvalidRequest(_))) => {
                    warn!(sku = %update.sku, error = %err, "sync update rejected");
                    report.record(
                        update,
                        MergeResult::Rejected {
                            reason: err.to_string(),
                        },
                    );
                }
                Err(err) => {
                    let requeued = 1 + remaining.len();
                    self.deferred.push(update, deferred_at);
                    for rest in remaining {
                        self.deferred.push(rest.update, rest.deferred_at);
                    }
                    let generation = self.finish(&mut report);
                    warn!(
                        error = %err,
                        applied = report.applied(),
                        requeued,
                        %generation,
                        "sync merge aborted"
                    );
                    return Err(err);
                }
            }
        }

        let generation = self.finish(&mut report);
        if !report.is_empty() {
            info!(
                applied = report.applied(),
                deferred = report.deferred(),
                stale = report.stale(),
                rejected = report.rejected(),
                %generation,
                "sync batch merged"
            );
        }
        Ok(report)
    }

    fn finish(&self, report: &mut SyncReport) -> Generation {
        report.generation = if report.applied() > 0 {
            self.store.advance_generation()
        } else {
            self.store.generation()
        };
        report.generation
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        self.store.snapshot()
    }
}

impl<S, L, B> InventorySync for ReconciliationEngine<S, L, B>
where
    S: InventoryStore + Clone,
    L: OrderLog,
    B: EventBus<OrderEnvelope>,
{
    fn merge_batch(&self, updates: Vec<ExternalUpdate>) -> DomainResult<SyncReport> {
        ReconciliationEngine::merge_batch(self, updates)
    }

    fn retry_deferred(&self) -> DomainResult<SyncReport> {
        ReconciliationEngine::retry_deferred(self)
    }

    fn snapshot(&self) -> InventorySnapshot {
        ReconciliationEngine::snapshot(self)
    }
}
