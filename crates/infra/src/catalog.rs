//! Seed catalog: products registered at boot from a JSON file.
//!
//! ```json
//! [{"sku": "WATER-1L", "name": "Still water 1L", "unit": "bottle", "quantity": 120}]
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use stockline_core::{DomainError, Sku};
use stockline_inventory::{InventoryStore, Product};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid catalog entry {sku}: {source}")]
    Invalid {
        sku: String,
        #[source]
        source: DomainError,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    sku: Sku,
    name: String,
    #[serde(default = "default_unit")]
    unit: String,
    quantity: i64,
}

fn default_unit() -> String {
    "unit".to_string()
}

/// Parse catalog JSON into products.
pub fn parse_catalog(json: &str) -> Result<Vec<Product>, CatalogError> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
    entries
        .into_iter()
        .map(|e| {
            let sku = e.sku.to_string();
            Product::new(e.sku, e.name, e.unit, e.quantity)
                .map_err(|source| CatalogError::Invalid { sku, source })
        })
        .collect()
}

pub fn load_catalog(path: &Path) -> Result<Vec<Product>, CatalogError> {
    let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_catalog(&json)
}

/// Register every product in `store`, returning how many were added.
pub fn seed<S: InventoryStore + ?Sized>(
    store: &S,
    products: Vec<Product>,
) -> Result<usize, CatalogError> {
    let count = products.len();
    for product in products {
        let sku = product.sku().to_string();
        store
            .register(product)
            .map_err(|source| CatalogError::Invalid { sku, source })?;
    }
    info!(products = count, "seed catalog registered");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_inventory::InMemoryInventoryStore;

    #[test]
    fn parses_and_seeds_catalog() {
        let products = parse_catalog(
            r#"[
                {"sku": "water-1l", "name": "Still water 1L", "unit": "bottle", "quantity": 10},
                {"sku": "COLA-330", "name": "Cola 330ml", "quantity": 24}
            ]"#,
        )
        .unwrap();
        assert_eq!(products[0].sku().as_str(), "WATER-1L");
        assert_eq!(products[1].unit(), "unit");

        let store = InMemoryInventoryStore::new();
        assert_eq!(seed(&store, products).unwrap(), 2);
        assert_eq!(store.get(&Sku::parse("COLA-330").unwrap()), Ok(24));
    }

    #[test]
    fn negative_quantity_is_invalid() {
        let err = parse_catalog(r#"[{"sku": "A", "name": "A", "quantity": -1}]"#).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { .. }));
    }

    #[test]
    fn malformed_sku_fails_parse() {
        let err = parse_catalog(r#"[{"sku": "no spaces", "name": "A", "quantity": 1}]"#).unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn duplicate_sku_is_rejected_on_seed() {
        let products = parse_catalog(
            r#"[{"sku": "A", "name": "A", "quantity": 1}, {"sku": "a", "name": "A", "quantity": 2}]"#,
        )
        .unwrap();
        let store = InMemoryInventoryStore::new();
        assert!(matches!(seed(&store, products), Err(CatalogError::Invalid { .. })));
    }
}
