//! Order intake validation.
//!
//! The validator only *reads* stock. Feasibility tags are advisory: the
//! atomic check-and-decrement happens later in the reconciliation engine, so a
//! line tagged feasible here can still be rejected under contention.

use serde::Serialize;
use tracing::debug;

use stockline_core::{DomainError, DomainResult, Sku};
use stockline_inventory::InventoryStore;

use crate::request::OrderRequest;

/// Longest requester identity accepted (an email address at most).
pub const MAX_REQUESTER_LEN: usize = 254;

/// A validated line with the stock observed at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentLine {
    pub sku: Sku,
    pub requested: i64,
    pub available: i64,
    pub feasible: bool,
}

/// A request that passed validation, ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIntent {
    request: OrderRequest,
    lines: Vec<IntentLine>,
}

impl ValidatedIntent {
    pub fn request(&self) -> &OrderRequest {
        &self.request
    }

    pub fn lines(&self) -> &[IntentLine] {
        &self.lines
    }
}

/// Validates order requests against the inventory catalog.
#[derive(Debug, Clone)]
pub struct OrderValidator<S> {
    store: S,
}

impl<S: InventoryStore> OrderValidator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Check shape and SKUs, then tag each line with current feasibility.
    ///
    /// - `InvalidRequest`: no lines, bad requester, quantity <= 0
    /// - `NotFound`: a line names an unknown SKU
    pub fn validate(&self, request: OrderRequest) -> DomainResult<ValidatedIntent> {
        let requester = request.requester();
        if requester.is_empty() {
            return Err(DomainError::invalid("requester cannot be empty"));
        }
        if requester.len() > MAX_REQUESTER_LEN {
            return Err(DomainError::invalid(format!(
                "requester longer than {MAX_REQUESTER_LEN} characters"
            )));
        }
        if request.lines().is_empty() {
            return Err(DomainError::invalid("order has no line items"));
        }

        let mut lines = Vec::with_capacity(request.lines().len());
        for (idx, item) in request.lines().iter().enumerate() {
            if item.quantity <= 0 {
                return Err(DomainError::invalid(format!(
                    "line {}: quantity must be positive (got {})",
                    idx + 1,
                    item.quantity
                )));
            }
            let available = self.store.get(&item.sku)?;
            lines.push(IntentLine {
                sku: item.sku.clone(),
                requested: item.quantity,
                available,
                feasible: item.quantity <= available,
            });
        }

        debug!(
            requester = %requester,
            source = request.source().as_str(),
            lines = lines.len(),
            infeasible = lines.iter().filter(|l| !l.feasible).count(),
            "order request validated"
        );

        Ok(ValidatedIntent { request, lines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{LineItem, OrderSource};
    use stockline_inventory::{InMemoryInventoryStore, Product};

    fn sku(s: &str) -> Sku {
        Sku::parse(s).unwrap()
    }

    fn validator() -> OrderValidator<InMemoryInventoryStore> {
        let store = InMemoryInventoryStore::with_products([
            Product::new(sku("WATER-1L"), "Still water 1L", "bottle", 10).unwrap(),
            Product::new(sku("COLA-330"), "Cola 330ml", "can", 2).unwrap(),
        ])
        .unwrap();
        OrderValidator::new(store)
    }

    fn request(lines: Vec<LineItem>) -> OrderRequest {
        OrderRequest::new("bar@example.com", lines, OrderSource::Webhook)
    }

    #[test]
    fn empty_order_is_invalid() {
        let err = validator().validate(request(vec![])).unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest(_)));
    }

    #[test]
    fn blank_or_oversized_requester_is_invalid() {
        let lines = vec![LineItem::new(sku("WATER-1L"), 1)];
        let blank = OrderRequest::new("  ", lines.clone(), OrderSource::WebForm);
        let huge = OrderRequest::new("x".repeat(MAX_REQUESTER_LEN + 1), lines, OrderSource::WebForm);

        assert!(matches!(validator().validate(blank), Err(DomainError::InvalidRequest(_))));
        assert!(matches!(validator().validate(huge), Err(DomainError::InvalidRequest(_))));
    }

    #[test]
    fn padded_requester_is_kept_trimmed() {
        let req = OrderRequest::new(
            "  bar@example.com \n",
            vec![LineItem::new(sku("WATER-1L"), 1)],
            OrderSource::WebForm,
        );
        let intent = validator().validate(req).unwrap();
        assert_eq!(intent.request().requester(), "bar@example.com");
    }

    #[test]
    fn non_positive_quantity_is_invalid() {
        let req = request(vec![LineItem::new(sku("WATER-1L"), 0)]);
        assert!(matches!(validator().validate(req), Err(DomainError::InvalidRequest(_))));

        let req = request(vec![LineItem::new(sku("WATER-1L"), -3)]);
        assert!(matches!(validator().validate(req), Err(DomainError::InvalidRequest(_))));
    }

    #[test]
    fn unknown_sku_is_not_found() {
        let req = request(vec![
            LineItem::new(sku("WATER-1L"), 1),
            LineItem::new(sku("GINGER-ALE"), 1),
        ]);
        assert_eq!(
            validator().validate(req),
            Err(DomainError::NotFound(sku("GINGER-ALE")))
        );
    }

    #[test]
    fn lines_are_tagged_by_current_stock() {
        let v = validator();
        let intent = v
            .validate(request(vec![
                LineItem::new(sku("WATER-1L"), 10),
                LineItem::new(sku("COLA-330"), 3),
            ]))
            .unwrap();

        assert!(intent.lines()[0].feasible);
        assert_eq!(intent.lines()[1].available, 2);
        assert!(!intent.lines()[1].feasible);
        // Validation never touches stock.
        assert_eq!(v.store.get(&sku("WATER-1L")), Ok(10));
    }
}
