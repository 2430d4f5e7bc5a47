//! Service wiring: store, engine, order log, bus, notifications, sync.

use std::io;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use stockline_events::InMemoryEventBus;
use stockline_infra::catalog;
use stockline_infra::config::AppConfig;
use stockline_infra::notify::{
    InMemoryDeadLetterStore, LogNotifier, NotificationDispatcher, Notifier, WebhookNotifier,
};
use stockline_infra::sync::{
    ExternalInventorySource, HttpInventorySource, NullSource, SyncScheduler,
};
use stockline_infra::{InMemoryOrderLog, OrderEnvelope, ReconciliationEngine, WorkerHandle};
use stockline_inventory::InMemoryInventoryStore;

pub type Store = Arc<InMemoryInventoryStore>;
pub type Log = Arc<InMemoryOrderLog>;
pub type Bus = Arc<InMemoryEventBus<OrderEnvelope>>;
pub type Engine = ReconciliationEngine<Store, Log, Bus>;
pub type Dispatcher = NotificationDispatcher<Arc<dyn Notifier>, Arc<InMemoryDeadLetterStore>>;

/// Everything the handlers need, shared through an `Extension`.
pub struct AppServices {
    pub engine: Arc<Engine>,
    pub dispatcher: Arc<Dispatcher>,
    config: AppConfig,
}

impl AppServices {
    /// Wire in-memory services from config and register the seed catalog.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        Self::with_notifier(config.clone(), notifier_for(&config))
    }

    pub fn with_notifier(config: AppConfig, notifier: Arc<dyn Notifier>) -> anyhow::Result<Self> {
        let store: Store = Arc::new(InMemoryInventoryStore::new());
        if let Some(path) = &config.inventory.catalog_path {
            let products = catalog::load_catalog(path)
                .with_context(|| format!("loading seed catalog {}", path.display()))?;
            catalog::seed(&store, products).context("seeding inventory")?;
        }

        let engine = Arc::new(ReconciliationEngine::with_settings(
            store,
            Arc::new(InMemoryOrderLog::new()),
            Arc::new(InMemoryEventBus::new()),
            config.sync.merge_settings(),
        ));

        info!(notifier = notifier.name(), "notification channel configured");
        let dispatcher = Arc::new(
            NotificationDispatcher::new(
                notifier,
                Arc::new(InMemoryDeadLetterStore::new()),
                config.notifications.retry.policy(),
            )
            .with_dedupe_capacity(config.notifications.dedupe_capacity),
        );

        Ok(Self {
            engine,
            dispatcher,
            config,
        })
    }

    pub fn store(&self) -> &Store {
        self.engine.store()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Start the notification dispatcher and, if enabled, the sync scheduler.
    pub fn start_workers(&self) -> io::Result<Workers> {
        let mut handles = vec![self.dispatcher.clone().spawn(self.engine.bus())?];

        if self.config.sync.enabled {
            let scheduler = SyncScheduler::new(
                self.engine.clone(),
                source_for(&self.config),
                self.config.sync.retry.policy(),
            );
            handles.push(scheduler.spawn(self.config.sync.interval())?);
        }

        Ok(Workers { handles })
    }
}

fn notifier_for(config: &AppConfig) -> Arc<dyn Notifier> {
    match &config.notifications.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            url.clone(),
            config.notifications.request_timeout(),
        )),
        None => Arc::new(LogNotifier),
    }
}

fn source_for(config: &AppConfig) -> Box<dyn ExternalInventorySource> {
    match &config.sync.source_url {
        Some(url) => Box::new(HttpInventorySource::new(
            url.clone(),
            config.sync.request_timeout(),
        )),
        None => Box::new(NullSource),
    }
}

/// Running background workers.
#[derive(Debug)]
pub struct Workers {
    handles: Vec<WorkerHandle>,
}

impl Workers {
    pub fn names(&self) -> Vec<&'static str> {
        self.handles.iter().map(WorkerHandle::name).collect()
    }

    /// Stop every worker and wait for it. Blocks.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown();
        }
    }
}
