use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;

/// Envelope for an event published on a bus.
///
/// Notes:
/// - `sequence_number` is monotonically increasing per `stream`, assigned by the
///   producer in production order; consumers use it to detect gaps and replays.
/// - `correlation_id` ties the event to the request that caused it (for orders,
///   the order id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    stream: String,
    sequence_number: u64,
    correlation_id: Uuid,
    event_type: String,
    published_at: DateTime<Utc>,
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap an event, taking the type name from the payload.
    pub fn wrap(
        stream: impl Into<String>,
        sequence_number: u64,
        correlation_id: Uuid,
        payload: E,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            stream: stream.into(),
            sequence_number,
            correlation_id,
            event_type: payload.event_type().to_string(),
            published_at: Utc::now(),
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
