//! Event primitives: the `Event` trait, envelopes, and the pub/sub bus that
//! carries processed orders to downstream consumers (notifications, SSE).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
