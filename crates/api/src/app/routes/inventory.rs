use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/snapshot", get(snapshot))
        .route("/sync", post(sync))
}

/// GET /inventory/snapshot
pub async fn snapshot(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.engine.snapshot())
}

/// POST /inventory/sync
///
/// Merges pushed tuples. Answers 409 with the full report when any tuple was
/// stale, so the source knows to resync against `GET /inventory/snapshot`.
pub async fn sync(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SyncRequest>,
) -> axum::response::Response {
    let updates = match body.into_domain() {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let engine = services.engine.clone();
    match tokio::task::spawn_blocking(move || engine.merge_batch(updates)).await {
        Ok(Ok(report)) => {
            let response = dto::SyncResponse::from(report);
            let status = if response.resync_required {
                StatusCode::CONFLICT
            } else {
                StatusCode::OK
            };
            (status, Json(response)).into_response()
        }
        Ok(Err(e)) => errors::domain_error_to_response(e),
        Err(join) => errors::task_failed(join),
    }
}
