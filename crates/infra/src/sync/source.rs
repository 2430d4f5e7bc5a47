//! External inventory sources polled by the sync scheduler.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use stockline_core::{Generation, Sku};
use stockline_inventory::InventorySnapshot;

use super::ExternalUpdate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("source request failed: {0}")]
    Transport(String),

    #[error("source answered with status {0}")]
    Status(u16),

    #[error("malformed source payload: {0}")]
    Decode(String),
}

/// A system that reports stock quantities (e.g. a spreadsheet export).
///
/// Sources live on the scheduler thread, hence `&mut self`.
pub trait ExternalInventorySource: Send {
    fn name(&self) -> &str;

    /// Fetch tuples reported since the last poll.
    fn poll(&mut self) -> Result<Vec<ExternalUpdate>, SourceError>;

    /// Fetch a full set of quantities computed against `snapshot`.
    fn resync(&mut self, snapshot: &InventorySnapshot) -> Result<Vec<ExternalUpdate>, SourceError>;
}

impl<S: ExternalInventorySource + ?Sized> ExternalInventorySource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn poll(&mut self) -> Result<Vec<ExternalUpdate>, SourceError> {
        (**self).poll()
    }

    fn resync(&mut self, snapshot: &InventorySnapshot) -> Result<Vec<ExternalUpdate>, SourceError> {
        (**self).resync(snapshot)
    }
}

/// Source that never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSource;

impl ExternalInventorySource for NullSource {
    fn name(&self) -> &str {
        "null"
    }

    fn poll(&mut self) -> Result<Vec<ExternalUpdate>, SourceError> {
        Ok(Vec::new())
    }

    fn resync(&mut self, _snapshot: &InventorySnapshot) -> Result<Vec<ExternalUpdate>, SourceError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct SourceRow {
    sku: String,
    quantity: i64,
    #[serde(default)]
    snapshot: Option<Generation>,
}

/// Polls a JSON endpoint returning `[{"sku", "quantity", "snapshot"}]`.
///
/// Resync requests add `?generation=N`; rows without a `snapshot` then
/// reference that generation.
#[derive(Debug)]
pub struct HttpInventorySource {
    url: String,
    timeout: Duration,
    client: Option<Client>,
}

impl HttpInventorySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            client: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // Built on first use so construction never happens on an async runtime.
    fn client(&mut self) -> Result<Client, SourceError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        self.client = Some(client.clone());
        Ok(client)
    }

    fn fetch(&mut self, generation: Option<Generation>) -> Result<Vec<SourceRow>, SourceError> {
        let client = self.client()?;
        let mut request = client.get(&self.url);
        if let Some(g) = generation {
            request = request.query(&[("generation", g.get())]);
        }

        let response = request
            .send()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        response
            .json::<Vec<SourceRow>>()
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

/// Convert raw rows, skipping unusable ones.
fn into_updates(
    source: &str,
    rows: Vec<SourceRow>,
    fallback: Option<Generation>,
) -> Vec<ExternalUpdate> {
    rows.into_iter()
        .filter_map(|row| {
            let sku = match Sku::parse(&row.sku) {
                Ok(sku) => sku,
                Err(err) => {
                    warn!(source, sku = %row.sku, error = %err, "skipping row with malformed sku");
                    return None;
                }
            };
            let Some(snapshot) = row.snapshot.or(fallback) else {
                warn!(source, sku = %sku, "skipping row without snapshot reference");
                return None;
            };
            Some(ExternalUpdate::new(sku, row.quantity, snapshot))
        })
        .collect()
}

impl ExternalInventorySource for HttpInventorySource {
    fn name(&self) -> &str {
        "http"
    }

    fn poll(&mut self) -> Result<Vec<ExternalUpdate>, SourceError> {
        let rows = self.fetch(None)?;
        debug!(url = %self.url, rows = rows.len(), "polled inventory source");
        Ok(into_updates(self.name(), rows, None))
    }

    fn resync(&mut self, snapshot: &InventorySnapshot) -> Result<Vec<ExternalUpdate>, SourceError> {
        let generation = snapshot.generation();
        let rows = self.fetch(Some(generation))?;
        debug!(url = %self.url, rows = rows.len(), %generation, "fetched inventory resync");
        Ok(into_updates(self.name(), rows, Some(generation)))
    }
}
