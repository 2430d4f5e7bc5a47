use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;
use std::thread;

use tokio_util::sync::CancellationToken;

use stockline_core::Sku;
use stockline_events::InMemoryEventBus;
use stockline_infra::sync::ExternalUpdate;
use stockline_infra::{InMemoryOrderLog, OrderEnvelope, ReconciliationEngine};
use stockline_inventory::{InMemoryInventoryStore, InventoryStore, Product};
use stockline_orders::{LineItem, OrderRequest, OrderSource};

type Engine = ReconciliationEngine<
    Arc<InMemoryInventoryStore>,
    Arc<InMemoryOrderLog>,
    Arc<InMemoryEventBus<OrderEnvelope>>,
>;

fn sku(i: usize) -> Sku {
    Sku::parse(&format!("SKU-{i}")).expect("valid sku")
}

fn engine(skus: usize, quantity: i64) -> Arc<Engine> {
    let store = InMemoryInventoryStore::with_products(
        (0..skus).map(|i| Product::new(sku(i), format!("Product {i}"), "unit", quantity).expect("valid product")),
    )
    .expect("unique skus");
    Arc::new(ReconciliationEngine::new(
        Arc::new(store),
        Arc::new(InMemoryOrderLog::new()),
        Arc::new(InMemoryEventBus::new()),
    ))
}

fn order(target: usize) -> OrderRequest {
    OrderRequest::new("bench@example.com", vec![LineItem::new(sku(target), 1)], OrderSource::WebForm)
}

fn bench_single_order_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_latency");
    group.sample_size(1000);

    group.bench_function("process_one_line", |b| {
        let engine = engine(1, i64::MAX / 2);
        let cancel = CancellationToken::new();
        b.iter(|| black_box(engine.process(order(0), &cancel).expect("processed")));
    });

    group.finish();
}

/// Contended vs. spread: the same number of orders hitting one SKU or many.
fn bench_contended_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_reconciliation");
    let threads = 8usize;
    let per_thread = 200usize;
    group.throughput(Throughput::Elements((threads * per_thread) as u64));

    for skus in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::new("skus", skus), &skus, |b, &skus| {
            b.iter(|| {
                let engine = engine(skus, i64::MAX / 2);
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let engine = engine.clone();
                        thread::spawn(move || {
                            let cancel = CancellationToken::new();
                            for n in 0..per_thread {
                                let _ = engine.process(order((t + n) % skus), &cancel);
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().expect("worker thread");
                }
            });
        });
    }

    group.finish();
}

fn bench_sync_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_merge");

    for batch in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("batch", batch), &batch, |b, &batch| {
            let engine = engine(batch, 10);
            let mut quantity = 10;
            b.iter(|| {
                quantity += 1;
                let generation = engine.store().generation();
                let updates = (0..batch)
                    .map(|i| ExternalUpdate::new(sku(i), quantity, generation))
                    .collect();
                black_box(engine.merge_batch(updates).expect("merged"))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_order_latency,
    bench_contended_reconciliation,
    bench_sync_merge
);
criterion_main!(benches);
