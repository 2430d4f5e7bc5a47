use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{Generation, OrderId, Sku};
use stockline_events::Event;

use crate::request::{OrderRequest, OrderSource};

/// Overall outcome of a processed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Accepted,
    Rejected,
    Partial,
}

impl OrderStatus {
    /// `Accepted` if every line was accepted, `Rejected` if none was,
    /// `Partial` otherwise. An empty slice counts as rejected.
    pub fn from_lines(lines: &[LineOutcome]) -> Self {
        let accepted = lines.iter().filter(|l| l.is_accepted()).count();
        match accepted {
            0 => OrderStatus::Rejected,
            n if n == lines.len() => OrderStatus::Accepted,
            _ => OrderStatus::Partial,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    Accepted,
    Rejected,
}

/// Why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    InsufficientStock { available: i64 },
    /// The line could not be applied for a reason other than stock level,
    /// after earlier lines of the same order had already committed.
    Unavailable { detail: String },
}

/// Per-line result of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineOutcome {
    pub sku: Sku,
    pub requested: i64,
    pub status: LineStatus,
    /// Stock left after this line committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl LineOutcome {
    pub fn accepted(sku: Sku, requested: i64, remaining: i64) -> Self {
        Self {
            sku,
            requested,
            status: LineStatus::Accepted,
            remaining: Some(remaining),
            reason: None,
        }
    }

    pub fn rejected(sku: Sku, requested: i64, reason: RejectReason) -> Self {
        Self {
            sku,
            requested,
            status: LineStatus::Rejected,
            remaining: None,
            reason: Some(reason),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == LineStatus::Accepted
    }
}

/// Immutable result of processing one order request, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    id: OrderId,
    requester: String,
    source: OrderSource,
    status: OrderStatus,
    lines: Vec<LineOutcome>,
    submitted_at: DateTime<Utc>,
    processed_at: DateTime<Utc>,
    generation: Generation,
}

impl OrderRecord {
    pub fn new(
        id: OrderId,
        request: &OrderRequest,
        lines: Vec<LineOutcome>,
        generation: Generation,
    ) -> Self {
        Self {
            id,
            requester: request.requester().to_string(),
            source: request.source(),
            status: OrderStatus::from_lines(&lines),
            lines,
            submitted_at: request.submitted_at(),
            processed_at: Utc::now(),
            generation,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn source(&self) -> OrderSource {
        self.source
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[LineOutcome] {
        &self.lines
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    /// Snapshot generation in effect once this order was reconciled.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn accepted_lines(&self) -> impl Iterator<Item = &LineOutcome> {
        self.lines.iter().filter(|l| l.is_accepted())
    }

    pub fn rejected_lines(&self) -> impl Iterator<Item = &LineOutcome> {
        self.lines.iter().filter(|l| !l.is_accepted())
    }
}

impl Event for OrderRecord {
    fn event_type(&self) -> &'static str {
        match self.status {
            OrderStatus::Accepted => "order.accepted",
            OrderStatus::Rejected => "order.rejected",
            OrderStatus::Partial => "order.partial",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.processed_at
    }
}
