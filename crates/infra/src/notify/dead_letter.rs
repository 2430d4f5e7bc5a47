use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use stockline_core::OrderId;

use super::types::DeadLetter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeadLetterError {
    #[error("dead letter for order {0} already recorded")]
    AlreadyExists(OrderId),

    #[error("no dead letter for order {0}")]
    NotFound(OrderId),
}

/// Notifications that exhausted retries. Nothing is retried automatically.
pub trait DeadLetterStore: Send + Sync {
    fn push(&self, letter: DeadLetter) -> Result<(), DeadLetterError>;

    /// Oldest first.
    fn list(&self) -> Vec<DeadLetter>;

    /// Remove and return the letter for `id`, for a manual requeue.
    fn take(&self, id: OrderId) -> Option<DeadLetter>;

    fn contains(&self, id: OrderId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D: DeadLetterStore + ?Sized> DeadLetterStore for Arc<D> {
    fn push(&self, letter: DeadLetter) -> Result<(), DeadLetterError> {
        (**self).push(letter)
    }

    fn list(&self) -> Vec<DeadLetter> {
        (**self).list()
    }

    fn take(&self, id: OrderId) -> Option<DeadLetter> {
        (**self).take(id)
    }

    fn contains(&self, id: OrderId) -> bool {
        (**self).contains(id)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDeadLetterStore {
    letters: RwLock<Vec<DeadLetter>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeadLetterStore for InMemoryDeadLetterStore {
    fn push(&self, letter: DeadLetter) -> Result<(), DeadLetterError> {
        let mut letters = self.letters.write();
        if letters
            .iter()
            .any(|l| l.correlation_id == letter.correlation_id)
        {
            return Err(DeadLetterError::AlreadyExists(letter.correlation_id));
        }
        letters.push(letter);
        Ok(())
    }

    fn list(&self) -> Vec<DeadLetter> {
        self.letters.read().clone()
    }

    fn take(&self, id: OrderId) -> Option<DeadLetter> {
        let mut letters = self.letters.write();
        let idx = letters.iter().position(|l| l.correlation_id == id)?;
        Some(letters.remove(idx))
    }

    fn contains(&self, id: OrderId) -> bool {
        self.letters.read().iter().any(|l| l.correlation_id == id)
    }

    fn len(&self) -> usize {
        self.letters.read().len()
    }
}
