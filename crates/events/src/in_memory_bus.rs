//! In-memory event bus for a single process.

use std::sync::mpsc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InMemoryBusError {
    /// The bus was closed; nothing more can be published.
    #[error("event bus closed")]
    Closed,
}

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Best-effort fan-out, publish order preserved per subscriber
/// - `close()` disconnects every subscriber so worker loops can exit
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    inner: Mutex<BusState<M>>,
}

#[derive(Debug)]
struct BusState<M> {
    subscribers: Vec<mpsc::Sender<M>>,
    closed: bool,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers (as of the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Drop all subscriber channels and refuse further publishes.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        state.closed = true;
        state.subscribers.clear();
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(BusState {
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut state = self.inner.lock();
        if state.closed {
            return Err(InMemoryBusError::Closed);
        }

        // Drop any dead subscribers while publishing.
        state.subscribers.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A subscription taken after close() is immediately disconnected.
        let mut state = self.inner.lock();
        if !state.closed {
            state.subscribers.push(tx);
        }

        Subscription::new(rx)
    }
}
