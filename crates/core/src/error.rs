//! Domain error model.

use std::time::Duration;

use thiserror::Error;

use crate::id::{Generation, Sku};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, stale sync data). Delivery and transport failures belong to the
/// infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown SKU. Not retried, surfaced to the caller.
    #[error("product not found: {0}")]
    NotFound(Sku),

    /// Malformed input (empty order, bad identifier, non-positive quantity).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Applying a delta would drive stock below zero.
    ///
    /// This is an expected business condition: order lines report it as a
    /// per-line rejection.
    #[error("insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: i64,
        available: i64,
    },

    /// An external update referenced a snapshot too old for a delta merge.
    #[error("stale snapshot: update references generation {reference}, current is {current}")]
    StaleSnapshot {
        reference: Generation,
        current: Generation,
    },

    /// The sync merge could not complete within its deadline.
    #[error("sync timed out after {0:?}")]
    SyncTimeout(Duration),

    /// The caller cancelled the request before any line was committed.
    #[error("request cancelled before commit")]
    Cancelled,

    /// A conflicting write (e.g. registering an existing SKU).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(sku: &Sku) -> Self {
        Self::NotFound(sku.clone())
    }

    /// Whether the sync scheduler should retry the operation that produced
    /// this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleSnapshot { .. } | Self::SyncTimeout(_))
    }
}
