//! Ordered store error types

use thiserror::Error;

/// Result type for ordered store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Ordered store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,

    #[error("invalid range: start key sorts after end key")]
    InvalidRange,

    #[error("store lock poisoned")]
    Poisoned,
}
