//! Shared fixture for the history query tests
//!
//! Commits blocks to a file block store and indexes them into an in-memory
//! ordered store the way the ledger's history writer does.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use ledger_history::blockstore::{Block, BlockStore, FileBlockStore, KvWrite, TransactionEnvelope};
use ledger_history::history::{
    construct_data_key, construct_global_index_key, construct_global_index_value,
    construct_local_index, KeyModification, QueryExecutor, Savepoint, SAVEPOINT_KEY,
};
use ledger_history::kvstore::{MemStore, OrderedStore, WriteBatch};
use ledger_history::HistoryConfig;
use tempfile::TempDir;

pub const NS: &str = "marbles";

pub fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// One write in a transaction under construction.
pub fn put(key: &str, value: &str) -> (String, KvWrite) {
    (NS.to_string(), KvWrite::put(key, value.as_bytes().to_vec()))
}

pub fn delete(key: &str) -> (String, KvWrite) {
    (NS.to_string(), KvWrite::delete(key))
}

pub struct Ledger {
    _dir: TempDir,
    pub blocks: Arc<FileBlockStore>,
    pub index: Arc<MemStore>,
    last_versions: HashMap<(String, String), u64>,
    next_tx: u64,
}

impl Ledger {
    /// Empty ledger holding only the genesis block.
    pub fn new() -> Self {
        Self::with_config(&HistoryConfig::default())
    }

    pub fn with_config(config: &HistoryConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let blocks = Arc::new(FileBlockStore::open(dir.path(), config).unwrap());
        let mut ledger = Self {
            _dir: dir,
            blocks,
            index: Arc::new(MemStore::new()),
            last_versions: HashMap::new(),
            next_tx: 0,
        };
        ledger.commit_block(vec![vec![]]);
        ledger
    }

    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(
            self.index.clone(),
            self.blocks.clone(),
            HistoryConfig::default(),
        )
    }

    pub fn height(&self) -> u64 {
        self.blocks.height()
    }

    /// Appends a block with one transaction per entry of `txs` and indexes it.
    /// Returns the block number.
    pub fn commit_block(&mut self, txs: Vec<Vec<(String, KvWrite)>>) -> u64 {
        let block_num = self.blocks.height();
        let mut envelopes = Vec::with_capacity(txs.len());
        for writes in txs {
            let tx_id = format!("tx{}", self.next_tx);
            let mut envelope = TransactionEnvelope::new(tx_id, timestamp(self.next_tx as i64));
            for (namespace, write) in writes {
                envelope = envelope.with_write(&namespace, write);
            }
            envelopes.push(envelope);
            self.next_tx += 1;
        }

        let block = Block::new(block_num, envelopes);
        self.blocks.append_block(&block).unwrap();
        self.index_block(&block);
        block_num
    }

    fn index_block(&mut self, block: &Block) {
        let mut written: BTreeMap<(String, String), Vec<u64>> = BTreeMap::new();
        for (tran_num, envelope) in block.transactions.iter().enumerate() {
            for write_set in &envelope.write_sets {
                for write in &write_set.writes {
                    let tran_nums = written
                        .entry((write_set.namespace.clone(), write.key.clone()))
                        .or_default();
                    if tran_nums.last() != Some(&(tran_num as u64)) {
                        tran_nums.push(tran_num as u64);
                    }
                }
            }
        }

        let mut batch = WriteBatch::new();
        for ((namespace, key), tran_nums) in written {
            let last = self
                .last_versions
                .entry((namespace.clone(), key.clone()))
                .or_insert(0);
            let min_version = *last + 1;
            *last += tran_nums.len() as u64;

            batch.put(
                construct_data_key(&namespace, &key, min_version),
                construct_local_index(block.number, &tran_nums),
            );
            batch.put(
                construct_global_index_key(&namespace, &key),
                construct_global_index_value(*last),
            );
        }
        let last_tran = block.transactions.len().saturating_sub(1) as u64;
        batch.put(
            SAVEPOINT_KEY.to_vec(),
            Savepoint::new(block.number, last_tran).to_bytes(),
        );
        self.index.write_batch(batch).unwrap();
    }
}

pub fn values(modifications: &[KeyModification]) -> Vec<String> {
    modifications
        .iter()
        .map(|m| String::from_utf8(m.value.clone()).unwrap())
        .collect()
}
