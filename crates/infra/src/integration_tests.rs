//! Integration tests for the order and sync pipelines.
//!
//! Tests: OrderRequest → Validator → Engine → Store + OrderLog → EventBus → Dispatcher
//!
//! Verifies:
//! - Concurrent orders never oversell
//! - Records reach the notifier once, in production order
//! - Sync merges respect reservations and staleness

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    use stockline_core::{DomainError, Generation, Sku};
    use stockline_events::InMemoryEventBus;
    use stockline_inventory::{InMemoryInventoryStore, InventoryStore, Product};
    use stockline_orders::{LineItem, OrderRecord, OrderRequest, OrderSource, OrderStatus};

    use crate::notify::{
        DeadLetterStore, DeliveryError, InMemoryDeadLetterStore, NotificationDispatcher,
        NotificationPayload, Notifier,
    };
    use crate::order_log::{InMemoryOrderLog, OrderLog};
    use crate::reconcile::{OrderEnvelope, ReconciliationEngine};
    use crate::retry::RetryPolicy;
    use crate::sync::{ExternalUpdate, NullSource, SyncScheduler};

    type Engine = ReconciliationEngine<
        Arc<InMemoryInventoryStore>,
        Arc<InMemoryOrderLog>,
        Arc<InMemoryEventBus<OrderEnvelope>>,
    >;

    fn sku(s: &str) -> Sku {
        Sku::parse(s).unwrap()
    }

    fn setup(products: &[(&str, i64)]) -> Arc<Engine> {
        let store = InMemoryInventoryStore::with_products(
            products
                .iter()
                .map(|(s, q)| Product::new(sku(s), *s, "bottle", *q).unwrap()),
        )
        .unwrap();
        Arc::new(ReconciliationEngine::new(
            Arc::new(store),
            Arc::new(InMemoryOrderLog::new()),
            Arc::new(InMemoryEventBus::new()),
        ))
    }

    fn order(requester: &str, sku_str: &str, quantity: i64, source: OrderSource) -> OrderRequest {
        OrderRequest::new(requester, vec![LineItem::new(sku(sku_str), quantity)], source)
    }

    /// Records every payload it receives; fails when `down` is set.
    #[derive(Default)]
    struct RecordingNotifier {
        delivered: Mutex<Vec<NotificationPayload>>,
        down: bool,
        tx: Mutex<Option<mpsc::Sender<()>>>,
    }

    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
            let result = if self.down {
                Err(DeliveryError::Transport("connection refused".into()))
            } else {
                self.delivered.lock().push(payload.clone());
                Ok(())
            };
            if let Some(tx) = self.tx.lock().as_ref() {
                let _ = tx.send(());
            }
            result
        }
    }

    #[test]
    fn concurrent_orders_for_last_units_accept_exactly_one() {
        let engine = setup(&[("WATER-1L", 10)]);

        let handles: Vec<_> = [OrderSource::WebForm, OrderSource::Webhook]
            .into_iter()
            .map(|source| {
                let engine = engine.clone();
                thread::spawn(move || {
                    engine
                        .process(
                            order("bar@example.com", "WATER-1L", 6, source),
                            &CancellationToken::new(),
                        )
                        .unwrap()
                })
            })
            .collect();
        let records: Vec<OrderRecord> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let accepted = records
            .iter()
            .filter(|r| r.status() == OrderStatus::Accepted)
            .count();
        let rejected = records
            .iter()
            .filter(|r| r.status() == OrderStatus::Rejected)
            .count();
        assert_eq!((accepted, rejected), (1, 1));
        assert_eq!(engine.store().get(&sku("WATER-1L")), Ok(4));
        assert_eq!(engine.log().len(), 2);
    }

    #[test]
    fn many_concurrent_orders_never_oversell() {
        let engine = setup(&[("COLA-330", 50), ("WATER-1L", 50)]);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let target = if i % 2 == 0 { "COLA-330" } else { "WATER-1L" };
                        let _ = engine.process(
                            order("load@example.com", target, 1 + (i % 3), OrderSource::WebForm),
                            &CancellationToken::new(),
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for target in ["COLA-330", "WATER-1L"] {
            let committed: i64 = engine
                .log()
                .list(usize::MAX)
                .iter()
                .flat_map(|r| r.accepted_lines().cloned().collect::<Vec<_>>())
                .filter(|l| l.sku == sku(target))
                .map(|l| l.requested)
                .sum();
            let left = engine.store().get(&sku(target)).unwrap();
            assert!(left >= 0);
            assert_eq!(left, 50 - committed);
        }
    }

    #[test]
    fn dispatcher_notifies_each_record_once_in_order() {
        let engine = setup(&[("WATER-1L", 10)]);
        let (tx, rx) = mpsc::channel();
        let notifier = Arc::new(RecordingNotifier {
            tx: Mutex::new(Some(tx)),
            ..Default::default()
        });
        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifier.clone(),
            Arc::new(InMemoryDeadLetterStore::new()),
            RetryPolicy::immediate(5),
        ));
        let worker = dispatcher.clone().spawn(engine.bus()).unwrap();

        let mut ids = Vec::new();
        for requester in ["a@example.com", "b@example.com", "c@example.com"] {
            let record = engine
                .process(
                    order(requester, "WATER-1L", 1, OrderSource::WebForm),
                    &CancellationToken::new(),
                )
                .unwrap();
            ids.push(record.id());
        }
        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }

        // Replay of an already delivered record is skipped.
        let replay = engine.log().get(ids[0]).unwrap();
        dispatcher.dispatch(&replay);

        worker.shutdown();
        let delivered = notifier.delivered.lock();
        let got: Vec<_> = delivered.iter().map(|p| p.correlation_id).collect();
        assert_eq!(got, ids);
        assert_eq!(delivered[1].recipient, "b@example.com");
    }

    #[test]
    fn notifier_outage_dead_letters_once() {
        let engine = setup(&[("WATER-1L", 10)]);
        let (tx, rx) = mpsc::channel();
        let notifier = Arc::new(RecordingNotifier {
            down: true,
            tx: Mutex::new(Some(tx)),
            ..Default::default()
        });
        let dead_letters = Arc::new(InMemoryDeadLetterStore::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifier,
            dead_letters.clone(),
            RetryPolicy::immediate(5),
        ));
        let worker = dispatcher.clone().spawn(engine.bus()).unwrap();

        let record = engine
            .process(
                order("bar@example.com", "WATER-1L", 2, OrderSource::Webhook),
                &CancellationToken::new(),
            )
            .unwrap();
        for _ in 0..5 {
            rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        // Let the worker finish recording the dead letter.
        worker.shutdown();

        assert_eq!(dead_letters.len(), 1);
        assert!(dead_letters.contains(record.id()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancellation_before_commit_leaves_stock_untouched() {
        let engine = setup(&[("WATER-1L", 10)]);
        let token = CancellationToken::new();
        token.cancel();

        let err = engine
            .process(order("bar@example.com", "WATER-1L", 3, OrderSource::WebForm), &token)
            .unwrap_err();
        assert_eq!(err, DomainError::Cancelled);
        assert_eq!(engine.store().get(&sku("WATER-1L")), Ok(10));
        assert_eq!(engine.store().generation(), Generation::ZERO);
    }

    #[test]
    fn two_generation_old_update_with_pending_reservation_is_stale() {
        let engine = setup(&[("WATER-1L", 10)]);
        let observed = engine.store().generation();
        for _ in 0..2 {
            engine
                .process(
                    order("bar@example.com", "WATER-1L", 1, OrderSource::WebForm),
                    &CancellationToken::new(),
                )
                .unwrap();
        }

        let report = engine
            .merge_batch(vec![ExternalUpdate::new(sku("WATER-1L"), 10, observed)])
            .unwrap();
        assert!(report.requires_resync());
        assert_eq!(engine.store().get(&sku("WATER-1L")), Ok(8));
    }

    #[test]
    fn snapshot_round_trip_is_a_no_op() {
        let engine = setup(&[("WATER-1L", 10), ("COLA-330", 3)]);
        engine
            .process(
                order("bar@example.com", "COLA-330", 1, OrderSource::WebForm),
                &CancellationToken::new(),
            )
            .unwrap();

        let before = engine.snapshot();
        let updates = before
            .quantities()
            .iter()
            .map(|(s, q)| ExternalUpdate::new(s.clone(), *q, before.generation()))
            .collect();
        let report = engine.merge_batch(updates).unwrap();

        assert_eq!(report.applied(), 0);
        let after = engine.snapshot();
        assert_eq!(after.generation(), before.generation());
        assert_eq!(after.quantities(), before.quantities());
    }

    #[test]
    fn scheduler_applies_deferred_update_on_next_cycle() {
        let engine = setup(&[("COLA-330", 8)]);
        let observed = engine.store().generation();
        engine
            .process(
                order("bar@example.com", "COLA-330", 3, OrderSource::WebForm),
                &CancellationToken::new(),
            )
            .unwrap();
        let report = engine
            .merge_batch(vec![ExternalUpdate::new(sku("COLA-330"), 12, observed)])
            .unwrap();
        assert_eq!(report.deferred(), 1);
        assert_eq!(engine.deferred().len(), 1);

        // No further traffic: the next cycle merges the queued tuple itself.
        let mut scheduler = SyncScheduler::new(engine.clone(), NullSource, RetryPolicy::immediate(3));
        let cycle = scheduler.run_cycle().unwrap();

        assert_eq!(cycle.deferred.applied(), 1);
        assert_eq!(cycle.deferred.entries[0].reported, 12);
        assert!(engine.deferred().is_empty());
        assert_eq!(engine.store().get(&sku("COLA-330")), Ok(12));
    }

    #[test]
    fn order_log_and_store_agree_after_mixed_traffic() {
        let engine = setup(&[("WATER-1L", 5)]);
        let token = CancellationToken::new();
        let statuses: Vec<_> = [3, 3, 2]
            .into_iter()
            .map(|q| {
                engine
                    .process(order("bar@example.com", "WATER-1L", q, OrderSource::WebForm), &token)
                    .unwrap()
                    .status()
            })
            .collect();

        assert_eq!(
            statuses,
            vec![OrderStatus::Accepted, OrderStatus::Rejected, OrderStatus::Accepted]
        );
        assert_eq!(engine.store().get(&sku("WATER-1L")), Ok(0));
        assert_eq!(engine.store().generation(), Generation::new(2));
        assert_eq!(engine.log().len(), 3);
    }
}
