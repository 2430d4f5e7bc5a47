//! Read-only product views for the rendering layer.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockline_core::Sku;
use stockline_inventory::InventoryStore;

use crate::app::services::AppServices;
use crate::app::errors;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/:sku", get(get_product))
}

pub async fn list_products(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.store().list())
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    let sku = match Sku::parse(&sku) {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.store().product(&sku) {
        Ok(product) => Json(product).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
