use std::convert::Infallible;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use stockline_core::OrderId;
use stockline_events::EventBus;
use stockline_infra::OrderLog;
use stockline_orders::OrderRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestContext;

const DEFAULT_LIST_LIMIT: usize = 50;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(submit_order))
        .route("/stream", get(stream_orders))
        .route("/:id", get(get_order))
}

/// Run an order through the engine on the blocking pool.
///
/// The token is cancelled if this future is dropped (client went away)
/// before the engine returns; the engine honours it until the first commit.
pub(crate) async fn process_order(
    services: Arc<AppServices>,
    ctx: RequestContext,
    request: OrderRequest,
) -> axum::response::Response {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let engine = services.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.process(request, &cancel)).await;
    guard.disarm();

    match result {
        Ok(Ok(record)) => {
            info!(
                request_id = %ctx.request_id(),
                order_id = %record.id(),
                status = record.status().as_str(),
                "order processed"
            );
            (StatusCode::CREATED, Json(record)).into_response()
        }
        Ok(Err(err)) => {
            debug!(request_id = %ctx.request_id(), error = %err, "order refused");
            errors::domain_error_to_response(err)
        }
        Err(join) => errors::task_failed(join),
    }
}

/// POST /orders (web form)
pub async fn submit_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::SubmitOrderRequest>,
) -> axum::response::Response {
    match body.into_domain() {
        Ok(request) => process_order(services, ctx, request).await,
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Json(services.engine.log().list(limit))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.engine.log().get(id) {
        Some(record) => Json(record).into_response(),
        None => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("order {id} not found"),
        ),
    }
}

/// GET /orders/stream
///
/// Server-Sent Events, one `order.*` event per processed order, in
/// production order, starting from the moment of subscription.
pub async fn stream_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> Sse<UnboundedReceiverStream<Result<SseEvent, Infallible>>> {
    let (tx, rx) = unbounded_channel::<Result<SseEvent, Infallible>>();
    let subscription = services.engine.bus().subscribe();

    tokio::task::spawn_blocking(move || {
        let mut last_heartbeat = Instant::now();
        loop {
            match subscription.recv_timeout(Duration::from_millis(1000)) {
                Ok(envelope) => {
                    let data = match serde_json::to_string(&envelope) {
                        Ok(s) => s,
                        Err(_) => continue,
                    };
                    let event = SseEvent::default()
                        .event(envelope.event_type())
                        .id(envelope.sequence_number().to_string())
                        .data(data);
                    if tx.send(Ok(event)).is_err() {
                        break;
                    }
                    last_heartbeat = Instant::now();
                }
                Err(RecvTimeoutError::Timeout) => {
                    if tx.is_closed() {
                        break;
                    }
                    if last_heartbeat.elapsed() > Duration::from_secs(15) {
                        let heartbeat = SseEvent::default().event("heartbeat").data("{}");
                        if tx.send(Ok(heartbeat)).is_err() {
                            break;
                        }
                        last_heartbeat = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    Sse::new(UnboundedReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
