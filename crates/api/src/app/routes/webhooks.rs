//! Intake for the chatbot front end. The chatbot itself is an opaque
//! external service; it forwards order intents here.

use std::sync::Arc;

use axum::{extract::Extension, routing::post, Json, Router};
use tracing::info;

use crate::app::routes::orders::process_order;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/chatbot", post(chatbot_order))
}

/// POST /webhooks/chatbot
pub async fn chatbot_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::ChatbotOrderRequest>,
) -> axum::response::Response {
    if let Some(conversation) = &body.conversation_id {
        info!(request_id = %ctx.request_id(), conversation = %conversation, "chatbot order intent");
    }
    match body.into_domain() {
        Ok(request) => process_order(services, ctx, request).await,
        Err(e) => errors::domain_error_to_response(e),
    }
}
