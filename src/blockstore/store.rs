//! File-backed block store
//!
//! Transactions are appended to a single block file. A location index maps
//! each (block, tx) pair to the byte range of its record; it is kept in an
//! ordered store under order-preserving keys and rebuilt by scanning the
//! file on open.
//!
//! Lookups consult two optional caches before touching storage:
//!
//! ```text
//! (block, tx) --location cache--> FileLocPointer --tx cache--> bytes
//!      |                               |
//!      +-- location index (miss)       +-- block file read (miss)
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::errors::{BlockStoreError, BlockStoreResult};
use super::reader::BlockFileReader;
use super::record::TxRecord;
use super::types::{Block, BlockTxPair, FileLocPointer, TransactionEnvelope};
use super::writer::BlockFileWriter;
use super::{BlockLocationCache, BlockStore, TxBytesCache};
use crate::cache::{CacheStats, LruCache};
use crate::codec::encode_order_preserving_var_u64;
use crate::config::HistoryConfig;
use crate::kvstore::{MemStore, OrderedStore, WriteBatch};

fn location_key(pair: BlockTxPair) -> Vec<u8> {
    let mut key = encode_order_preserving_var_u64(pair.block_num);
    key.extend(encode_order_preserving_var_u64(pair.tran_num));
    key
}

fn decode_location(pair: BlockTxPair, bytes: &[u8]) -> BlockStoreResult<FileLocPointer> {
    FileLocPointer::from_bytes(bytes).map_err(|e| BlockStoreError::LocationCorruption {
        block_num: pair.block_num,
        tran_num: pair.tran_num,
        reason: e.to_string(),
    })
}

fn block_range(block_num: u64) -> (Vec<u8>, Vec<u8>) {
    let start = encode_order_preserving_var_u64(block_num);
    let end = match block_num.checked_add(1) {
        Some(next) => encode_order_preserving_var_u64(next),
        None => vec![0xFF],
    };
    (start, end)
}

/// Statistics of both lookup caches, `None` for a disabled cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStoreCacheStats {
    pub block_location: Option<CacheStats>,
    pub tx: Option<CacheStats>,
}

/// Block store over an append-only, checksummed block file.
pub struct FileBlockStore {
    dir: PathBuf,
    writer: Mutex<BlockFileWriter>,
    reader: Mutex<BlockFileReader>,
    locations: MemStore,
    height: AtomicU64,
    location_cache: Option<BlockLocationCache>,
    tx_cache: Option<TxBytesCache>,
}

impl FileBlockStore {
    /// Opens or creates a block store in `dir`.
    ///
    /// Scans the existing block file to rebuild the location index. Blocks
    /// must be contiguous from 0 and transactions contiguous from 0 inside
    /// each block; anything else is reported as corruption.
    pub fn open(dir: &Path, config: &HistoryConfig) -> BlockStoreResult<Self> {
        let writer = BlockFileWriter::open(dir)?;
        let mut reader = BlockFileReader::open(writer.path())?;

        let locations = MemStore::new();
        let mut batch = WriteBatch::new();
        let mut expected = BlockTxPair::new(0, 0);
        let mut height = 0u64;
        let mut records = 0usize;

        while let Some((location, record)) = reader.read_next()? {
            let pair = BlockTxPair::new(record.block_num, record.tran_num);
            let continues_block = pair == expected;
            let starts_next_block =
                expected.tran_num > 0 && pair == BlockTxPair::new(expected.block_num + 1, 0);

            if !continues_block && !starts_next_block {
                return Err(BlockStoreError::corruption(
                    location.offset,
                    format!(
                        "unexpected record for block {} tx {} (expected block {} tx {})",
                        pair.block_num, pair.tran_num, expected.block_num, expected.tran_num
                    ),
                ));
            }

            batch.put(location_key(pair), location.to_bytes());
            expected = BlockTxPair::new(pair.block_num, pair.tran_num + 1);
            height = pair.block_num + 1;
            records += 1;
        }
        locations.write_batch(batch)?;

        info!(
            path = %writer.path().display(),
            height,
            records,
            "opened block store"
        );

        let location_cache = config
            .block_location_cache
            .enabled
            .then(|| LruCache::new(config.block_location_cache.capacity));
        let tx_cache = config
            .tx_cache
            .enabled
            .then(|| LruCache::new(config.tx_cache.capacity));

        Ok(Self {
            dir: dir.to_path_buf(),
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            locations,
            height: AtomicU64::new(height),
            location_cache,
            tx_cache,
        })
    }

    /// Directory holding the block file.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Appends the next block.
    ///
    /// `block.number` must equal the current height and the block must hold
    /// at least one transaction.
    pub fn append_block(&self, block: &Block) -> BlockStoreResult<()> {
        let mut writer = self.writer.lock().map_err(|_| BlockStoreError::Poisoned)?;

        let height = self.height.load(Ordering::SeqCst);
        if block.number != height {
            return Err(BlockStoreError::InvalidBlock(format!(
                "expected block {}, got {}",
                height, block.number
            )));
        }
        if block.transactions.is_empty() {
            return Err(BlockStoreError::InvalidBlock(format!(
                "block {} has no transactions",
                block.number
            )));
        }

        let mut records = Vec::with_capacity(block.transactions.len());
        for (tran_num, tx) in block.transactions.iter().enumerate() {
            records.push(TxRecord::new(
                block.number,
                tran_num as u64,
                serde_json::to_vec(tx)?,
            ));
        }

        let locations = writer.append(&records)?;

        let mut batch = WriteBatch::new();
        for (tran_num, location) in locations.iter().enumerate() {
            let pair = BlockTxPair::new(block.number, tran_num as u64);
            batch.put(location_key(pair), location.to_bytes());
        }
        self.locations.write_batch(batch)?;
        self.height.store(height + 1, Ordering::SeqCst);

        debug!(
            block_num = block.number,
            transactions = records.len(),
            "appended block"
        );
        Ok(())
    }

    /// Hit/miss/eviction counters of the lookup caches.
    pub fn cache_stats(&self) -> BlockStoreCacheStats {
        BlockStoreCacheStats {
            block_location: self.location_cache.as_ref().map(|c| c.stats()),
            tx: self.tx_cache.as_ref().map(|c| c.stats()),
        }
    }

    fn check_block(&self, block_num: u64) -> BlockStoreResult<()> {
        let height = self.height.load(Ordering::SeqCst);
        if block_num >= height {
            return Err(BlockStoreError::BlockNotFound { block_num, height });
        }
        Ok(())
    }

    fn locate(&self, pair: BlockTxPair) -> BlockStoreResult<FileLocPointer> {
        if let Some(cache) = &self.location_cache {
            if let Some(location) = cache.get(&pair) {
                return Ok(location);
            }
        }

        let bytes = self
            .locations
            .get(&location_key(pair))?
            .ok_or(BlockStoreError::TxNotFound {
                block_num: pair.block_num,
                tran_num: pair.tran_num,
            })?;
        let location = decode_location(pair, &bytes)?;

        if let Some(cache) = &self.location_cache {
            cache.put(pair, location);
        }
        Ok(location)
    }

    fn read_payload(
        &self,
        pair: BlockTxPair,
        location: FileLocPointer,
    ) -> BlockStoreResult<Arc<[u8]>> {
        if let Some(cache) = &self.tx_cache {
            if let Some(bytes) = cache.get(&location) {
                return Ok(bytes);
            }
        }

        debug!(
            block_num = pair.block_num,
            tran_num = pair.tran_num,
            offset = location.offset,
            "reading transaction from block file"
        );

        let record = {
            let mut reader = self.reader.lock().map_err(|_| BlockStoreError::Poisoned)?;
            reader.read_at(location)?
        };
        if record.block_num != pair.block_num || record.tran_num != pair.tran_num {
            return Err(BlockStoreError::corruption(
                location.offset,
                format!(
                    "record holds block {} tx {}, expected block {} tx {}",
                    record.block_num, record.tran_num, pair.block_num, pair.tran_num
                ),
            ));
        }

        let bytes: Arc<[u8]> = Arc::from(record.payload);
        if let Some(cache) = &self.tx_cache {
            cache.put(location, Arc::clone(&bytes));
        }
        Ok(bytes)
    }

    fn load_tx(&self, pair: BlockTxPair) -> BlockStoreResult<TransactionEnvelope> {
        let location = self.locate(pair)?;
        let payload = self.read_payload(pair, location)?;
        Ok(serde_json::from_slice(&payload)?)
    }
}

impl BlockStore for FileBlockStore {
    fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    fn retrieve_block_by_number(&self, block_num: u64) -> BlockStoreResult<Block> {
        self.check_block(block_num)?;

        let (start, end) = block_range(block_num);
        let mut itr = self.locations.iterator(&start, &end)?;
        let mut transactions = Vec::new();
        while itr.next() {
            let pair = BlockTxPair::new(block_num, transactions.len() as u64);
            let location = match itr.value() {
                Some(bytes) => decode_location(pair, bytes)?,
                None => break,
            };
            let payload = self.read_payload(pair, location)?;
            transactions.push(serde_json::from_slice(&payload)?);
        }
        itr.release();

        Ok(Block::new(block_num, transactions))
    }

    fn retrieve_tx_by_block_num_tran_num(
        &self,
        block_num: u64,
        tran_num: u64,
    ) -> BlockStoreResult<TransactionEnvelope> {
        self.check_block(block_num)?;
        self.load_tx(BlockTxPair::new(block_num, tran_num))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockstore::{KvWrite, BLOCK_FILE_NAME};
    use chrono::{TimeZone, Utc};
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::TempDir;

    fn tx(id: &str, key: &str) -> TransactionEnvelope {
        TransactionEnvelope::new(id, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .with_write("ns", KvWrite::put(key, id.as_bytes().to_vec()))
    }

    fn block(number: u64, ids: &[&str]) -> Block {
        Block::new(number, ids.iter().map(|id| tx(id, "k")).collect())
    }

    #[test]
    fn test_append_and_retrieve() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::default()).unwrap();
        store.append_block(&block(0, &["genesis"])).unwrap();
        store.append_block(&block(1, &["t1", "t2"])).unwrap();

        assert_eq!(store.height(), 2);
        let fetched = store.retrieve_block_by_number(1).unwrap();
        assert_eq!(fetched, block(1, &["t1", "t2"]));
        assert_eq!(
            store.retrieve_tx_by_block_num_tran_num(1, 1).unwrap().tx_id,
            "t2"
        );
    }

    #[test]
    fn test_missing_block_and_tx() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::default()).unwrap();
        store.append_block(&block(0, &["g"])).unwrap();

        let err = store.retrieve_block_by_number(1).unwrap_err();
        assert!(matches!(err, BlockStoreError::BlockNotFound { block_num: 1, height: 1 }));

        let err = store.retrieve_tx_by_block_num_tran_num(0, 5).unwrap_err();
        assert!(matches!(err, BlockStoreError::TxNotFound { .. }));
    }

    #[test]
    fn test_rejects_out_of_order_and_empty_blocks() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::default()).unwrap();

        assert!(matches!(
            store.append_block(&block(3, &["x"])),
            Err(BlockStoreError::InvalidBlock(_))
        ));
        assert!(matches!(
            store.append_block(&Block::new(0, Vec::new())),
            Err(BlockStoreError::InvalidBlock(_))
        ));
        assert_eq!(store.height(), 0);
    }

    #[test]
    fn test_reopen_rebuilds_locations() {
        let tmp = TempDir::new().unwrap();
        {
            let store = FileBlockStore::open(tmp.path(), &HistoryConfig::default()).unwrap();
            store.append_block(&block(0, &["g"])).unwrap();
            store.append_block(&block(1, &["a", "b", "c"])).unwrap();
        }

        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::without_caches()).unwrap();
        assert_eq!(store.height(), 2);
        assert_eq!(
            store.retrieve_tx_by_block_num_tran_num(1, 2).unwrap().tx_id,
            "c"
        );
        store.append_block(&block(2, &["d"])).unwrap();
        assert_eq!(store.retrieve_block_by_number(2).unwrap().transactions.len(), 1);
    }

    #[test]
    fn test_caches_serve_repeated_lookups() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::default()).unwrap();
        store.append_block(&block(0, &["g"])).unwrap();
        store.append_block(&block(1, &["a", "b"])).unwrap();

        store.retrieve_tx_by_block_num_tran_num(1, 0).unwrap();
        store.retrieve_tx_by_block_num_tran_num(1, 0).unwrap();

        let stats = store.cache_stats();
        let location = stats.block_location.unwrap();
        let tx = stats.tx.unwrap();
        assert_eq!((location.hits, location.misses), (1, 1));
        assert_eq!((tx.hits, tx.misses), (1, 1));
    }

    #[test]
    fn test_disabled_caches_report_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::without_caches()).unwrap();
        assert_eq!(
            store.cache_stats(),
            BlockStoreCacheStats {
                block_location: None,
                tx: None
            }
        );
    }

    fn record_offsets(path: &Path) -> Vec<FileLocPointer> {
        let mut reader = BlockFileReader::open(path).unwrap();
        let mut locs = Vec::new();
        while let Some((loc, _)) = reader.read_next().unwrap() {
            locs.push(loc);
        }
        locs
    }

    #[test]
    fn test_append_after_torn_tail_stays_readable() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::without_caches()).unwrap();
        store.append_block(&block(0, &["g"])).unwrap();

        // Bytes of a block whose append failed partway.
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(tmp.path().join(BLOCK_FILE_NAME))
                .unwrap();
            file.write_all(&[0x20; 100]).unwrap();
        }

        store.append_block(&block(1, &["a"])).unwrap();
        assert_eq!(
            store.retrieve_tx_by_block_num_tran_num(1, 0).unwrap().tx_id,
            "a"
        );
        drop(store);

        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::without_caches()).unwrap();
        assert_eq!(store.height(), 2);
        assert_eq!(store.retrieve_block_by_number(1).unwrap(), block(1, &["a"]));
    }

    #[test]
    fn test_checksum_verified_on_lookup() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::default()).unwrap();
        store.append_block(&block(0, &["g"])).unwrap();
        store.append_block(&block(1, &["a", "b"])).unwrap();

        let path = tmp.path().join(BLOCK_FILE_NAME);
        let target = record_offsets(&path)[1];
        {
            let mut file = OpenOptions::new().write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(target.offset + 30)).unwrap();
            file.write_all(&[0xEE]).unwrap();
        }

        let err = store.retrieve_tx_by_block_num_tran_num(1, 0).unwrap_err();
        assert!(matches!(
            err,
            BlockStoreError::Corruption { offset, .. } if offset == target.offset
        ));
        assert!(store.retrieve_block_by_number(1).unwrap_err().is_corruption());
        assert_eq!(
            store.retrieve_tx_by_block_num_tran_num(1, 1).unwrap().tx_id,
            "b"
        );
    }

    #[test]
    fn test_record_identity_verified_on_lookup() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlockStore::open(tmp.path(), &HistoryConfig::default()).unwrap();
        store.append_block(&block(0, &["g"])).unwrap();
        store.append_block(&block(1, &["a", "b"])).unwrap();

        // Rewrite (1, 0) in place as a valid record claiming to be (1, 5).
        let path = tmp.path().join(BLOCK_FILE_NAME);
        let target = record_offsets(&path)[1];
        let original = BlockFileReader::open(&path).unwrap().read_at(target).unwrap();
        let forged = TxRecord::new(1, 5, original.payload).serialize();
        assert_eq!(forged.len() as u64, target.length);
        {
            let mut file = OpenOptions::new().write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(target.offset)).unwrap();
            file.write_all(&forged).unwrap();
        }

        let err = store.retrieve_tx_by_block_num_tran_num(1, 0).unwrap_err();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("expected block 1 tx 0"));
    }

    #[test]
    fn test_corrupted_payload_detected_on_read() {
        let tmp = TempDir::new().unwrap();
        {
            let store = FileBlockStore::open(tmp.path(), &HistoryConfig::default()).unwrap();
            store.append_block(&block(0, &["genesis"])).unwrap();
        }
        {
            let mut file = OpenOptions::new()
                .write(true)
                .open(tmp.path().join("blocks.dat"))
                .unwrap();
            file.seek(SeekFrom::Start(30)).unwrap();
            file.write_all(&[0xEE]).unwrap();
        }

        let err = FileBlockStore::open(tmp.path(), &HistoryConfig::default())
            .err()
            .unwrap();
        assert!(err.is_corruption());
    }
}
