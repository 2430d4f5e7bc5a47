use std::collections::{HashSet, VecDeque};
use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use stockline_core::OrderId;
use stockline_events::EventBus;
use stockline_orders::OrderRecord;

use super::dead_letter::{DeadLetterError, DeadLetterStore};
use super::notifier::Notifier;
use super::types::{DeadLetter, NotificationPayload};
use crate::reconcile::OrderEnvelope;
use crate::retry::{Exhausted, RetryPolicy};
use crate::workers::{BusWorker, WorkerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered { attempts: u32 },
    /// Already delivered or dead-lettered under this correlation id.
    Duplicate,
    DeadLettered { attempts: u32 },
}

const DEFAULT_DEDUPE_CAPACITY: usize = 100_000;

/// Correlation ids already handled, oldest evicted first once full.
#[derive(Debug)]
struct SeenIds {
    ids: HashSet<OrderId>,
    order: VecDeque<OrderId>,
    capacity: usize,
}

impl SeenIds {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns `false` if `id` is already remembered.
    fn insert(&mut self, id: OrderId) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }
}

/// Delivers one notification per processed order.
///
/// At-least-once with bounded backoff; a correlation id is handled once
/// unless a dead letter is requeued by hand. Only the most recent
/// `dedupe_capacity` ids are remembered.
pub struct NotificationDispatcher<N, D> {
    notifier: N,
    dead_letters: D,
    policy: RetryPolicy,
    seen: Mutex<SeenIds>,
}

impl<N, D> NotificationDispatcher<N, D>
where
    N: Notifier + 'static,
    D: DeadLetterStore + 'static,
{
    pub fn new(notifier: N, dead_letters: D, policy: RetryPolicy) -> Self {
        Self {
            notifier,
            dead_letters,
            policy,
            seen: Mutex::new(SeenIds::new(DEFAULT_DEDUPE_CAPACITY)),
        }
    }

    pub fn with_dedupe_capacity(mut self, capacity: usize) -> Self {
        self.seen = Mutex::new(SeenIds::new(capacity));
        self
    }

    pub fn dead_letters(&self) -> &D {
        &self.dead_letters
    }

    pub fn dispatch(&self, record: &OrderRecord) -> DispatchOutcome {
        if !self.seen.lock().insert(record.id()) {
            debug!(correlation_id = %record.id(), "notification already handled");
            return DispatchOutcome::Duplicate;
        }
        self.deliver(record)
    }

    /// Re-dispatch a dead letter with a fresh retry budget.
    pub fn requeue(&self, id: OrderId) -> Result<DispatchOutcome, DeadLetterError> {
        let letter = self
            .dead_letters
            .take(id)
            .ok_or(DeadLetterError::NotFound(id))?;
        info!(correlation_id = %id, previous_attempts = letter.attempts, "requeueing dead letter");
        Ok(self.deliver(&letter.record))
    }

    fn deliver(&self, record: &OrderRecord) -> DispatchOutcome {
        let payload = NotificationPayload::for_record(record);
        let notifier = self.notifier.name();

        let result = self.policy.run(
            |attempt| {
                self.notifier.deliver(&payload).inspect_err(|err| {
                    warn!(
                        notifier,
                        correlation_id = %payload.correlation_id,
                        attempt,
                        error = %err,
                        "notification attempt failed"
                    );
                })
            },
            |_| true,
        );

        match result {
            Ok(((), attempts)) => {
                debug!(notifier, correlation_id = %payload.correlation_id, attempts, "notification delivered");
                DispatchOutcome::Delivered { attempts }
            }
            Err(Exhausted {
                attempts,
                last_error,
            }) => {
                let correlation_id = payload.correlation_id;
                let letter = DeadLetter::new(payload, record.clone(), attempts, last_error.to_string());
                match self.dead_letters.push(letter) {
                    Ok(()) => error!(
                        notifier,
                        %correlation_id,
                        attempts,
                        error = %last_error,
                        "notification dead-lettered"
                    ),
                    Err(err) => warn!(%correlation_id, error = %err, "dead letter not recorded"),
                }
                DispatchOutcome::DeadLettered { attempts }
            }
        }
    }

    /// Consume order envelopes from `bus` on a dedicated thread, in publish order.
    pub fn spawn<B>(self: Arc<Self>, bus: &B) -> io::Result<WorkerHandle>
    where
        B: EventBus<OrderEnvelope> + ?Sized,
    {
        BusWorker::spawn("notification-dispatcher", bus, move |envelope: OrderEnvelope| {
            self.dispatch(envelope.payload());
            Ok::<(), Infallible>(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use stockline_core::{Generation, Sku};
    use stockline_orders::{LineItem, LineOutcome, OrderRequest, OrderSource};

    use crate::notify::{DeliveryError, InMemoryDeadLetterStore};

    /// Fails the first `failures` deliveries.
    #[derive(Default)]
    struct FlakyNotifier {
        failures: u32,
        calls: AtomicU32,
    }

    impl Notifier for FlakyNotifier {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn deliver(&self, _payload: &NotificationPayload) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(DeliveryError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    fn record() -> OrderRecord {
        let sku = Sku::parse("WATER-1L").unwrap();
        let request = OrderRequest::new(
            "bar@example.com",
            vec![LineItem::new(sku.clone(), 2)],
            OrderSource::Webhook,
        );
        OrderRecord::new(
            OrderId::new(),
            &request,
            vec![LineOutcome::accepted(sku, 2, 8)],
            Generation::new(1),
        )
    }

    fn dispatcher(
        failures: u32,
    ) -> NotificationDispatcher<Arc<FlakyNotifier>, Arc<InMemoryDeadLetterStore>> {
        NotificationDispatcher::new(
            Arc::new(FlakyNotifier {
                failures,
                ..Default::default()
            }),
            Arc::new(InMemoryDeadLetterStore::new()),
            RetryPolicy::immediate(5),
        )
    }

    #[test]
    fn payload_targets_requester_with_order_correlation() {
        let r = record();
        let payload = NotificationPayload::for_record(&r);
        assert_eq!(payload.recipient, "bar@example.com");
        assert_eq!(payload.correlation_id, r.id());
        assert!(payload.body.contains("2 x WATER-1L: accepted"));
    }

    #[test]
    fn transient_failure_is_retried_then_delivered() {
        let d = dispatcher(2);
        assert_eq!(d.dispatch(&record()), DispatchOutcome::Delivered { attempts: 3 });
        assert!(d.dead_letters().is_empty());
    }

    #[test]
    fn same_record_is_delivered_once() {
        let d = dispatcher(0);
        let r = record();
        assert_eq!(d.dispatch(&r), DispatchOutcome::Delivered { attempts: 1 });
        assert_eq!(d.dispatch(&r), DispatchOutcome::Duplicate);
        assert_eq!(d.notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exhausted_delivery_is_dead_lettered_exactly_once() {
        let d = dispatcher(u32::MAX);
        let r = record();

        assert_eq!(d.dispatch(&r), DispatchOutcome::DeadLettered { attempts: 5 });
        assert_eq!(d.dispatch(&r), DispatchOutcome::Duplicate);

        assert_eq!(d.notifier.calls.load(Ordering::SeqCst), 5);
        let letters = d.dead_letters().list();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].correlation_id, r.id());
        assert_eq!(letters[0].attempts, 5);
    }

    #[test]
    fn dedupe_window_forgets_oldest_ids() {
        let d = dispatcher(0).with_dedupe_capacity(2);
        let (first, second, third) = (record(), record(), record());
        for r in [&first, &second, &third] {
            assert_eq!(d.dispatch(r), DispatchOutcome::Delivered { attempts: 1 });
        }

        assert_eq!(d.dispatch(&third), DispatchOutcome::Duplicate);
        assert_eq!(d.dispatch(&first), DispatchOutcome::Delivered { attempts: 1 });
        assert_eq!(d.notifier.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn requeue_redelivers_with_fresh_budget() {
        let d = dispatcher(5);
        let r = record();
        assert_eq!(d.dispatch(&r), DispatchOutcome::DeadLettered { attempts: 5 });

        assert_eq!(d.requeue(r.id()), Ok(DispatchOutcome::Delivered { attempts: 1 }));
        assert!(d.dead_letters().is_empty());
        assert_eq!(d.requeue(r.id()), Err(DeadLetterError::NotFound(r.id())));
    }
}
