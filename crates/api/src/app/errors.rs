use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockline_core::DomainError;

/// Non-standard "client closed request" status.
const CLIENT_CLOSED_REQUEST: u16 = 499;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::InvalidRequest(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_request", message)
        }
        DomainError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        DomainError::StaleSnapshot { reference, current } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "stale_snapshot",
                "message": message,
                "resync_required": true,
                "reference": reference,
                "current": current,
            })),
        )
            .into_response(),
        DomainError::SyncTimeout(_) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "sync_timeout", message)
        }
        DomainError::Cancelled => json_error(
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::REQUEST_TIMEOUT),
            "cancelled",
            message,
        ),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// A blocking task panicked or was aborted.
pub fn task_failed(err: tokio::task::JoinError) -> axum::response::Response {
    tracing::error!(error = %err, "blocking task failed");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "request could not be completed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stockline_core::{Generation, Sku};

    #[test]
    fn domain_errors_map_to_statuses() {
        let sku = Sku::parse("A").unwrap();
        let cases = [
            (DomainError::NotFound(sku.clone()), StatusCode::NOT_FOUND),
            (DomainError::invalid("x"), StatusCode::BAD_REQUEST),
            (
                DomainError::StaleSnapshot {
                    reference: Generation::ZERO,
                    current: Generation::new(2),
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::SyncTimeout(Duration::from_secs(1)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (DomainError::conflict("dup"), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }
        assert_eq!(
            domain_error_to_response(DomainError::Cancelled).status().as_u16(),
            499
        );
    }
}
