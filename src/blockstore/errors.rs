//! Block store error types

use thiserror::Error;

use crate::kvstore::StoreError;

/// Result type for block store operations
pub type BlockStoreResult<T> = Result<T, BlockStoreError>;

/// Block store errors
#[derive(Debug, Error)]
pub enum BlockStoreError {
    #[error("block {block_num} not found (chain height {height})")]
    BlockNotFound { block_num: u64, height: u64 },

    #[error("transaction {tran_num} not found in block {block_num}")]
    TxNotFound { block_num: u64, tran_num: u64 },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("block file corruption at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    #[error("location index entry of block {block_num} tx {tran_num} is unreadable: {reason}")]
    LocationCorruption {
        block_num: u64,
        tran_num: u64,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("location index error: {0}")]
    Index(#[from] StoreError),

    #[error("block store lock poisoned")]
    Poisoned,
}

impl BlockStoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BlockStoreError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        BlockStoreError::Corruption {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether the requested block or transaction does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BlockStoreError::BlockNotFound { .. } | BlockStoreError::TxNotFound { .. }
        )
    }

    /// Whether stored bytes failed validation.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            BlockStoreError::Corruption { .. } | BlockStoreError::LocationCorruption { .. }
        )
    }
}
