//! Block store subsystem
//!
//! Append-only storage of committed blocks. The history scanners only read
//! through the [`BlockStore`] trait; [`FileBlockStore`] is the bundled
//! implementation.
//!
//! # Design Principles
//!
//! - Append-only, no in-place updates
//! - Checksum-verified on every read
//! - Location lookups accelerated by two bounded LRU caches, which are never
//!   a source of truth

mod errors;
mod reader;
mod record;
mod store;
mod types;
mod writer;

use std::sync::Arc;

use crate::cache::LruCache;

pub use errors::{BlockStoreError, BlockStoreResult};
pub use reader::BlockFileReader;
pub use record::{TxRecord, RECORD_OVERHEAD};
pub use store::{BlockStoreCacheStats, FileBlockStore};
pub use types::{Block, BlockTxPair, FileLocPointer, KvWrite, NsWriteSet, TransactionEnvelope};
pub use writer::{BlockFileWriter, BLOCK_FILE_NAME};

/// Cache of block file locations keyed by (block, tx).
pub type BlockLocationCache = LruCache<BlockTxPair, FileLocPointer>;

/// Cache of raw transaction bytes keyed by block file location.
pub type TxBytesCache = LruCache<FileLocPointer, Arc<[u8]>>;

/// Read access to committed blocks.
pub trait BlockStore: Send + Sync {
    /// Number of committed blocks. Valid block numbers are `0..height`.
    fn height(&self) -> u64;

    /// Fails with `BlockNotFound` if `block_num >= height`.
    fn retrieve_block_by_number(&self, block_num: u64) -> BlockStoreResult<Block>;

    /// Fetches one transaction of a committed block.
    fn retrieve_tx_by_block_num_tran_num(
        &self,
        block_num: u64,
        tran_num: u64,
    ) -> BlockStoreResult<TransactionEnvelope>;
}
