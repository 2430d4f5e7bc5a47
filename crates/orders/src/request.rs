use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{Sku, ValueObject};

/// Where an order request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    WebForm,
    Webhook,
}

impl OrderSource {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderSource::WebForm => "web_form",
            OrderSource::Webhook => "webhook",
        }
    }
}

/// One requested line: SKU and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: Sku,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(sku: Sku, quantity: i64) -> Self {
        Self { sku, quantity }
    }
}

impl ValueObject for LineItem {}

/// A typed order request, built at the intake boundary.
///
/// Immutable once created. The requester is stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    requester: String,
    lines: Vec<LineItem>,
    submitted_at: DateTime<Utc>,
    source: OrderSource,
}

impl OrderRequest {
    pub fn new(requester: impl Into<String>, lines: Vec<LineItem>, source: OrderSource) -> Self {
        Self::new_at(requester, lines, source, Utc::now())
    }

    pub fn new_at(
        requester: impl Into<String>,
        lines: Vec<LineItem>,
        source: OrderSource,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            requester: requester.into().trim().to_string(),
            lines,
            submitted_at,
            source,
        }
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn source(&self) -> OrderSource {
        self.source
    }
}
