//! Background worker threads with graceful shutdown.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use stockline_events::{EventBus, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    fn spawn(
        name: &'static str,
        body: impl FnOnce(mpsc::Receiver<()>) + Send + 'static,
    ) -> io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(shutdown_rx))?;

        Ok(Self {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                warn!(worker = self.name, "worker thread panicked");
            }
        }
        debug!(worker = self.name, "worker stopped");
    }
}

/// Consumes every message published on a bus, in publish order.
#[derive(Debug)]
pub struct BusWorker;

impl BusWorker {
    /// Spawn a thread that feeds each bus message to `handler`.
    ///
    /// The subscription is taken before this returns, so nothing published
    /// afterwards is missed. Handler errors are logged and the loop continues.
    pub fn spawn<M, B, H, E>(name: &'static str, bus: &B, mut handler: H) -> io::Result<WorkerHandle>
    where
        M: Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let sub: Subscription<M> = bus.subscribe();
        WorkerHandle::spawn(name, move |shutdown_rx| {
            bus_loop(name, sub, shutdown_rx, &mut handler)
        })
    }
}

fn bus_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    handler: &mut H,
) where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "bus worker handler failed");
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Runs a task on a fixed interval until shut down.
#[derive(Debug)]
pub struct PeriodicWorker;

impl PeriodicWorker {
    /// Spawn a thread that calls `tick` immediately and then every `interval`.
    pub fn spawn<F>(name: &'static str, interval: Duration, mut tick: F) -> io::Result<WorkerHandle>
    where
        F: FnMut() + Send + 'static,
    {
        WorkerHandle::spawn(name, move |shutdown_rx| {
            loop {
                tick();
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    }
}
