use serde::{Deserialize, Serialize};

use stockline_core::{DomainResult, Generation, Sku};
use stockline_infra::sync::{ExternalUpdate, SyncReport};
use stockline_orders::{LineItem, OrderRequest, OrderSource};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub sku: String,
    pub quantity: i64,
}

/// Web form order submission.
#[derive(Debug, Deserialize)]
pub struct SubmitOrderRequest {
    pub requester: String,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

/// Order intent forwarded by the chatbot front end.
#[derive(Debug, Deserialize)]
pub struct ChatbotOrderRequest {
    pub requester: String,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncUpdateRequest {
    pub sku: String,
    pub quantity: i64,
    pub snapshot: Generation,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub updates: Vec<SyncUpdateRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    #[serde(flatten)]
    pub report: SyncReport,
    pub resync_required: bool,
}

impl From<SyncReport> for SyncResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            resync_required: report.requires_resync(),
            report,
        }
    }
}

// -------------------------
// Mapping helpers
// -------------------------

fn order_request(
    requester: String,
    items: Vec<OrderItemRequest>,
    source: OrderSource,
) -> DomainResult<OrderRequest> {
    let lines = items
        .into_iter()
        .map(|item| Ok(LineItem::new(Sku::parse(&item.sku)?, item.quantity)))
        .collect::<DomainResult<Vec<_>>>()?;
    Ok(OrderRequest::new(requester, lines, source))
}

impl SubmitOrderRequest {
    pub fn into_domain(self) -> DomainResult<OrderRequest> {
        order_request(self.requester, self.items, OrderSource::WebForm)
    }
}

impl ChatbotOrderRequest {
    pub fn into_domain(self) -> DomainResult<OrderRequest> {
        order_request(self.requester, self.items, OrderSource::Webhook)
    }
}

impl SyncRequest {
    pub fn into_domain(self) -> DomainResult<Vec<ExternalUpdate>> {
        self.updates
            .into_iter()
            .map(|u| Ok(ExternalUpdate::new(Sku::parse(&u.sku)?, u.quantity, u.snapshot)))
            .collect()
    }
}
