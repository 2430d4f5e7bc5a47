use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum::http::StatusCode;

use stockline_core::OrderId;
use stockline_infra::notify::{DeadLetterError, DeadLetterStore};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/dead-letters", get(list_dead_letters))
        .route("/dead-letters/:id/requeue", post(requeue_dead_letter))
}

/// GET /notifications/dead-letters
pub async fn list_dead_letters(
    Extension(services): Extension<Arc<AppServices>>,
) -> impl IntoResponse {
    Json(services.dispatcher.dead_letters().list())
}

/// POST /notifications/dead-letters/:id/requeue
///
/// Re-dispatches once with a fresh retry budget; blocks until delivered or
/// dead-lettered again.
pub async fn requeue_dead_letter(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let dispatcher = services.dispatcher.clone();
    match tokio::task::spawn_blocking(move || dispatcher.requeue(id)).await {
        Ok(Ok(outcome)) => Json(outcome).into_response(),
        Ok(Err(e @ DeadLetterError::NotFound(_))) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", e.to_string())
        }
        Ok(Err(e)) => errors::json_error(StatusCode::CONFLICT, "conflict", e.to_string()),
        Err(join) => errors::task_failed(join),
    }
}
