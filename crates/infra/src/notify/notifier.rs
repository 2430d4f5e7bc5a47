use std::time::Duration;

use parking_lot::Mutex;
use reqwest::blocking::Client;
use tracing::info;

use super::types::{DeliveryError, NotificationPayload};

/// Outbound notification channel. Success or failure only.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError>;
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        (**self).deliver(payload)
    }
}

/// Writes notifications to the log. For development.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        info!(
            recipient = %payload.recipient,
            correlation_id = %payload.correlation_id,
            subject = %payload.subject,
            "notification"
        );
        Ok(())
    }
}

/// POSTs the JSON payload to a webhook; any non-2xx answer is a failure.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
    client: Mutex<Option<Client>>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            client: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // Built lazily on the dispatcher thread, outside any async runtime.
    fn client(&self) -> Result<Client, DeliveryError> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        *slot = Some(client.clone());
        Ok(client)
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        let response = self
            .client()?
            .post(&self.url)
            .json(payload)
            .send()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
