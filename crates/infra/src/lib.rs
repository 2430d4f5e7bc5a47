//! Infrastructure layer: the reconciliation engine and everything that runs
//! around it (external sync, notification delivery, order log, workers,
//! configuration, seed catalog).

pub mod catalog;
pub mod config;
pub mod notify;
pub mod order_log;
pub mod reconcile;
pub mod retry;
pub mod sync;
pub mod workers;

pub use config::AppConfig;
pub use order_log::{InMemoryOrderLog, OrderLog};
pub use reconcile::{MergeSettings, ORDER_STREAM, OrderEnvelope, ReconciliationEngine};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use workers::WorkerHandle;

#[cfg(test)]
mod integration_tests;
