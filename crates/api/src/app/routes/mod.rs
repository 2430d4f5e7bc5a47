use axum::Router;

pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod system;
pub mod webhooks;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/orders", orders::router())
        .nest("/webhooks", webhooks::router())
        .nest("/inventory", inventory::router())
        .nest("/notifications", notifications::router())
}
