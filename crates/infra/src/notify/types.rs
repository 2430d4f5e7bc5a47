use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockline_core::OrderId;
use stockline_orders::{OrderRecord, OrderStatus};

/// What the notifier receives for one processed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    /// The order id.
    pub correlation_id: OrderId,
}

impl NotificationPayload {
    pub fn for_record(record: &OrderRecord) -> Self {
        let subject = match record.status() {
            OrderStatus::Accepted => format!("Order {} confirmed", record.id()),
            OrderStatus::Partial => format!("Order {} partially confirmed", record.id()),
            OrderStatus::Rejected => format!("Order {} could not be fulfilled", record.id()),
        };

        let mut body = String::new();
        for line in record.lines() {
            let verdict = if line.is_accepted() {
                "accepted"
            } else {
                "unavailable"
            };
            body.push_str(&format!("{} x {}: {}\n", line.requested, line.sku, verdict));
        }

        Self {
            recipient: record.requester().to_string(),
            subject,
            body,
            correlation_id: record.id(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("notifier unreachable: {0}")]
    Transport(String),

    #[error("notifier answered with status {0}")]
    Status(u16),
}

/// A notification that exhausted its delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub correlation_id: OrderId,
    pub payload: NotificationPayload,
    pub record: OrderRecord,
    pub attempts: u32,
    pub last_error: String,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        payload: NotificationPayload,
        record: OrderRecord,
        attempts: u32,
        last_error: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: record.id(),
            payload,
            record,
            attempts,
            last_error: last_error.into(),
            dead_lettered_at: Utc::now(),
        }
    }
}
