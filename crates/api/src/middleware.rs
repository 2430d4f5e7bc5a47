use std::time::Instant;

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use crate::context::RequestContext;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Attach a `RequestContext` and log one line per request.
///
/// A valid UUID in `x-request-id` is reused; otherwise a new one is minted.
/// The id is echoed back on the response.
pub async fn request_context(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let request_id = extract_request_id(req.headers()).unwrap_or_else(Uuid::now_v7);
    req.extensions_mut().insert(RequestContext::new(request_id));

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let mut response = next.run(req).await;

    info!(
        %request_id,
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn extract_request_id(headers: &HeaderMap) -> Option<Uuid> {
    let raw = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?;
    Uuid::parse_str(raw.trim()).ok()
}
