//! Append-only audit log of processed orders.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use stockline_core::{DomainError, DomainResult, OrderId};
use stockline_orders::record::OrderRecord;

/// Order audit log.
///
/// Records are never updated or removed once appended.
pub trait OrderLog: Send + Sync {
    /// Append a record. Fails with `Conflict` if the id is already present.
    fn append(&self, record: OrderRecord) -> DomainResult<()>;

    fn get(&self, id: OrderId) -> Option<OrderRecord>;

    /// Most recent records first, at most `limit` of them.
    fn list(&self, limit: usize) -> Vec<OrderRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<L> OrderLog for Arc<L>
where
    L: OrderLog + ?Sized,
{
    fn append(&self, record: OrderRecord) -> DomainResult<()> {
        (**self).append(record)
    }

    fn get(&self, id: OrderId) -> Option<OrderRecord> {
        (**self).get(id)
    }

    fn list(&self, limit: usize) -> Vec<OrderRecord> {
        (**self).list(limit)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

#[derive(Debug, Default)]
struct LogState {
    records: Vec<OrderRecord>,
    index: HashMap<OrderId, usize>,
}

/// In-memory order log.
#[derive(Debug, Default)]
pub struct InMemoryOrderLog {
    inner: RwLock<LogState>,
}

impl InMemoryOrderLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderLog for InMemoryOrderLog {
    fn append(&self, record: OrderRecord) -> DomainResult<()> {
        let mut state = self.inner.write();
        if state.index.contains_key(&record.id()) {
            return Err(DomainError::conflict(format!(
                "order {} already recorded",
                record.id()
            )));
        }
        let position = state.records.len();
        state.index.insert(record.id(), position);
        state.records.push(record);
        Ok(())
    }

    fn get(&self, id: OrderId) -> Option<OrderRecord> {
        let state = self.inner.read();
        state.index.get(&id).map(|&i| state.records[i].clone())
    }

    fn list(&self, limit: usize) -> Vec<OrderRecord> {
        self.inner
            .read()
            .records
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.read().records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_core::{Generation, Sku};
    use stockline_orders::record::LineOutcome;
    use stockline_orders::request::{LineItem, OrderRequest, OrderSource};

    fn record() -> OrderRecord {
        let sku = Sku::parse("WATER-1L").unwrap();
        let request = OrderRequest::new(
            "shop@example.com",
            vec![LineItem::new(sku.clone(), 1)],
            OrderSource::WebForm,
        );
        OrderRecord::new(
            OrderId::new(),
            &request,
            vec![LineOutcome::accepted(sku, 1, 9)],
            Generation::new(1),
        )
    }

    #[test]
    fn append_then_get() {
        let log = InMemoryOrderLog::new();
        let r = record();
        log.append(r.clone()).unwrap();
        assert_eq!(log.get(r.id()), Some(r));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn duplicate_id_conflicts() {
        let log = InMemoryOrderLog::new();
        let r = record();
        log.append(r.clone()).unwrap();
        assert!(matches!(log.append(r), Err(DomainError::Conflict(_))));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn list_is_newest_first_and_limited() {
        let log = InMemoryOrderLog::new();
        let records: Vec<_> = (0..4).map(|_| record()).collect();
        for r in &records {
            log.append(r.clone()).unwrap();
        }

        let listed = log.list(2);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id(), records[3].id());
        assert_eq!(listed[1].id(), records[2].id());
    }
}
