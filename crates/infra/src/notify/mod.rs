//! Notification dispatch: turns processed orders into outbound
//! notifications with at-least-once delivery and a dead-letter list.

mod dead_letter;
mod dispatcher;
mod notifier;
mod types;

pub use dead_letter::{DeadLetterError, DeadLetterStore, InMemoryDeadLetterStore};
pub use dispatcher::{DispatchOutcome, NotificationDispatcher};
pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use types::{DeadLetter, DeliveryError, NotificationPayload};
