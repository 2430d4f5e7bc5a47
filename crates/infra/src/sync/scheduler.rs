use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use stockline_core::DomainError;

use super::{ExternalInventorySource, InventorySync, SourceError, SyncReport};
use crate::retry::{Exhausted, RetryPolicy};
use crate::workers::{PeriodicWorker, WorkerHandle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Domain(err) => err.is_retryable(),
            SyncError::Source(_) => true,
        }
    }
}

/// Reports of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCycle {
    pub deferred: SyncReport,
    pub polled: SyncReport,
    /// Present when the polled batch had stale tuples.
    pub resync: Option<SyncReport>,
}

/// Periodically pulls an external source into the engine.
pub struct SyncScheduler<E, Src> {
    sync: E,
    source: Src,
    policy: RetryPolicy,
}

impl<E, Src> SyncScheduler<E, Src>
where
    E: InventorySync + 'static,
    Src: ExternalInventorySource + 'static,
{
    pub fn new(sync: E, source: Src, policy: RetryPolicy) -> Self {
        Self {
            sync,
            source,
            policy,
        }
    }

    /// One attempt: retry deferred tuples, poll, merge, resync if stale.
    pub fn run_cycle(&mut self) -> Result<SyncCycle, SyncError> {
        let deferred = self.sync.retry_deferred()?;

        let updates = self.source.poll()?;
        debug!(source = self.source.name(), updates = updates.len(), "polled source");
        let polled = self.sync.merge_batch(updates)?;

        let resync = if polled.requires_resync() {
            let snapshot = self.sync.snapshot();
            info!(
                source = self.source.name(),
                stale = polled.stale(),
                generation = %snapshot.generation(),
                "stale updates, requesting full resync"
            );
            let updates = self.source.resync(&snapshot)?;
            Some(self.sync.merge_batch(updates)?)
        } else {
            None
        };

        Ok(SyncCycle {
            deferred,
            polled,
            resync,
        })
    }

    /// Run a cycle, retrying transient failures with the backoff policy.
    pub fn run_with_retry(&mut self) -> Result<SyncCycle, Exhausted<SyncError>> {
        let policy = self.policy.clone();
        let result = policy.run(
            |attempt| {
                self.run_cycle().inspect_err(|err| {
                    debug!(attempt, error = %err, "sync cycle attempt failed");
                })
            },
            SyncError::is_retryable,
        );

        match result {
            Ok((cycle, _)) => Ok(cycle),
            Err(exhausted) => {
                warn!(
                    source = self.source.name(),
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "sync cycle failed, waiting for next interval"
                );
                Err(exhausted)
            }
        }
    }

    /// Run cycles every `interval` on a dedicated thread.
    pub fn spawn(mut self, interval: Duration) -> io::Result<WorkerHandle> {
        info!(source = self.source.name(), ?interval, "starting sync scheduler");
        PeriodicWorker::spawn("inventory-sync", interval, move || {
            self.run_with_retry().ok();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use stockline_core::{DomainResult, Generation, Sku};
    use stockline_inventory::InventorySnapshot;

    use crate::sync::{ExternalUpdate, MergeResult};

    #[derive(Default)]
    struct ScriptedSync {
        batches: Mutex<Vec<Vec<ExternalUpdate>>>,
        results: Mutex<VecDeque<DomainResult<SyncReport>>>,
    }

    impl InventorySync for ScriptedSync {
        fn merge_batch(&self, updates: Vec<ExternalUpdate>) -> DomainResult<SyncReport> {
            self.batches.lock().push(updates);
            self.results
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(SyncReport::default()))
        }

        fn retry_deferred(&self) -> DomainResult<SyncReport> {
            Ok(SyncReport::default())
        }

        fn snapshot(&self) -> InventorySnapshot {
            InventorySnapshot::new(Generation::new(7), chrono::Utc::now(), Default::default())
        }
    }

    struct ScriptedSource {
        polls: VecDeque<Result<Vec<ExternalUpdate>, SourceError>>,
        resyncs: Arc<Mutex<Vec<Generation>>>,
    }

    impl ExternalInventorySource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn poll(&mut self) -> Result<Vec<ExternalUpdate>, SourceError> {
            self.polls.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }

        fn resync(
            &mut self,
            snapshot: &InventorySnapshot,
        ) -> Result<Vec<ExternalUpdate>, SourceError> {
            self.resyncs.lock().push(snapshot.generation());
            Ok(vec![update(snapshot.generation())])
        }
    }

    fn update(snapshot: Generation) -> ExternalUpdate {
        ExternalUpdate::new(Sku::parse("COLA-330").unwrap(), 5, snapshot)
    }

    fn stale_report() -> SyncReport {
        let mut report = SyncReport::default();
        report.record(
            update(Generation::ZERO),
            MergeResult::Stale {
                current: Generation::new(7),
            },
        );
        report
    }

    #[test]
    fn stale_batch_triggers_resync_against_current_snapshot() {
        let sync = Arc::new(ScriptedSync::default());
        sync.results.lock().push_back(Ok(stale_report()));
        let resyncs = Arc::new(Mutex::new(Vec::new()));
        let source = ScriptedSource {
            polls: VecDeque::from([Ok(vec![update(Generation::ZERO)])]),
            resyncs: resyncs.clone(),
        };

        let mut scheduler = SyncScheduler::new(sync.clone(), source, RetryPolicy::immediate(3));
        let cycle = scheduler.run_cycle().unwrap();

        assert!(cycle.resync.is_some());
        assert_eq!(*resyncs.lock(), vec![Generation::new(7)]);
        let batches = sync.batches.lock();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1][0].snapshot, Generation::new(7));
    }

    #[test]
    fn transient_failures_are_retried() {
        let sync = Arc::new(ScriptedSync::default());
        sync.results
            .lock()
            .push_back(Err(DomainError::SyncTimeout(Duration::from_millis(1))));
        let source = ScriptedSource {
            polls: VecDeque::from([
                Err(SourceError::Status(502)),
                Ok(vec![update(Generation::ZERO)]),
                Ok(vec![update(Generation::ZERO)]),
            ]),
            resyncs: Arc::default(),
        };

        let mut scheduler = SyncScheduler::new(sync.clone(), source, RetryPolicy::immediate(5));
        assert!(scheduler.run_with_retry().is_ok());
        // Poll failed once, merge timed out once, third attempt succeeded.
        assert_eq!(sync.batches.lock().len(), 2);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let sync = Arc::new(ScriptedSync::default());
        sync.results
            .lock()
            .push_back(Err(DomainError::invalid("broken batch")));
        let source = ScriptedSource {
            polls: VecDeque::new(),
            resyncs: Arc::default(),
        };

        let mut scheduler = SyncScheduler::new(sync, source, RetryPolicy::immediate(5));
        let err = scheduler.run_with_retry().unwrap_err();
        assert_eq!(err.attempts, 1);
    }
}
