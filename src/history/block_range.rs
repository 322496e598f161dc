//! Frequently-updated keys over a block range

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::decoder::TxDecoder;
use super::errors::{HistoryError, HistoryResult};
use super::keys::{construct_range_scan, decode_local_index};
use super::scanner::{fetch_key_modification, ResultsIterator};
use super::types::QueryResultBatch;
use crate::blockstore::BlockStore;
use crate::kvstore::{OrderedStore, RangeIterator};

/// Ascending cursor over one candidate key's index entries.
struct KeyCursor {
    key: String,
    itr: Option<Box<dyn RangeIterator>>,
    /// Entry under the cursor, `None` once exhausted.
    current: Option<(u64, Vec<u64>)>,
}

impl KeyCursor {
    fn load(&mut self, found: bool) -> HistoryResult<()> {
        self.current = None;
        if !found {
            return Ok(());
        }
        if let Some(itr) = self.itr.as_ref() {
            let value = itr.value().ok_or_else(|| {
                HistoryError::malformed_encoding("index cursor positioned without a value")
            })?;
            self.current = Some(decode_local_index(value)?);
        }
        Ok(())
    }

    /// Positions on the first entry at or after block `start`.
    ///
    /// Entries are ordered by version, not block, so this walks forward from
    /// the first entry: O(entries before `start`) per candidate key.
    fn seek_block(&mut self, start: u64) -> HistoryResult<()> {
        let found = self.itr.as_mut().map_or(false, |itr| itr.first());
        self.load(found)?;
        while matches!(self.current, Some((block_num, _)) if block_num < start) {
            self.advance()?;
        }
        Ok(())
    }

    fn advance(&mut self) -> HistoryResult<()> {
        let found = self.itr.as_mut().map_or(false, |itr| itr.next());
        self.load(found)
    }

    fn block_num(&self) -> Option<u64> {
        self.current.as_ref().map(|(block_num, _)| *block_num)
    }

    fn close(&mut self) {
        self.current = None;
        if let Some(mut itr) = self.itr.take() {
            itr.release();
        }
    }
}

/// Updates of every key written at least `updates` times in
/// `start..=end`, one batch per block in ascending block order.
///
/// Construction scans every block of the range once to count updates per key;
/// each candidate key then gets its own ascending index cursor. A batch holds
/// the candidates' modifications in that block, grouped by key in ascending
/// key order and by ascending transaction number within a key.
pub struct BlockRangeScanner {
    namespace: String,
    end: u64,
    block_store: Arc<dyn BlockStore>,
    decoder: Arc<dyn TxDecoder>,
    cursors: Vec<KeyCursor>,
}

impl BlockRangeScanner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn open(
        index: &dyn OrderedStore,
        block_store: Arc<dyn BlockStore>,
        decoder: Arc<dyn TxDecoder>,
        namespace: &str,
        start: u64,
        end: u64,
        updates: u64,
        min_block_num: u64,
    ) -> HistoryResult<Self> {
        if end < start {
            warn!(namespace, start, end, "rejected inverted block range");
            return Err(HistoryError::invalid_range(format!(
                "end block {} is lower than start block {}",
                end, start
            )));
        }
        if start < min_block_num {
            warn!(
                namespace,
                start, min_block_num, "rejected block range below minimum"
            );
            return Err(HistoryError::invalid_range(format!(
                "start block {} is below the minimum block {}",
                start, min_block_num
            )));
        }

        let counts = count_key_updates(
            block_store.as_ref(),
            decoder.as_ref(),
            namespace,
            start,
            end,
        )?;
        let candidates: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count >= updates)
            .map(|(key, _)| key)
            .collect();
        info!(
            namespace,
            start,
            end,
            updates,
            candidates = candidates.len(),
            "counted key updates over block range"
        );

        let mut scanner = Self {
            namespace: namespace.to_string(),
            end,
            block_store,
            decoder,
            cursors: Vec::with_capacity(candidates.len()),
        };
        for key in candidates {
            let range_scan = construct_range_scan(namespace, &key);
            let itr = index.iterator(&range_scan.start_key, &range_scan.end_key)?;
            let mut cursor = KeyCursor {
                key,
                itr: Some(itr),
                current: None,
            };
            cursor.seek_block(start)?;
            scanner.cursors.push(cursor);
        }
        Ok(scanner)
    }

    /// Keys that met the update threshold, ascending.
    pub fn candidate_keys(&self) -> Vec<&str> {
        self.cursors.iter().map(|c| c.key.as_str()).collect()
    }
}

/// Number of transactions in `start..=end` that wrote each key.
fn count_key_updates(
    block_store: &dyn BlockStore,
    decoder: &dyn TxDecoder,
    namespace: &str,
    start: u64,
    end: u64,
) -> HistoryResult<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for block_num in start..=end {
        let block = block_store.retrieve_block_by_number(block_num)?;
        for envelope in &block.transactions {
            for key in decoder.written_keys(envelope, namespace)? {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
    }
    Ok(counts)
}

impl ResultsIterator for BlockRangeScanner {
    type Item = QueryResultBatch;

    fn next(&mut self) -> HistoryResult<Option<QueryResultBatch>> {
        let block_num = match self.cursors.iter().filter_map(KeyCursor::block_num).min() {
            Some(block_num) if block_num <= self.end => block_num,
            _ => return Ok(None),
        };

        let mut results = Vec::new();
        for cursor in self.cursors.iter_mut() {
            let tran_nums = match &cursor.current {
                Some((current, tran_nums)) if *current == block_num => tran_nums.clone(),
                _ => continue,
            };
            for tran_num in tran_nums {
                results.push(fetch_key_modification(
                    self.block_store.as_ref(),
                    self.decoder.as_ref(),
                    &self.namespace,
                    &cursor.key,
                    block_num,
                    tran_num,
                )?);
            }
            cursor.advance()?;
        }

        debug!(
            namespace = %self.namespace,
            block_num,
            results = results.len(),
            "assembled block batch"
        );
        Ok(Some(QueryResultBatch { block_num, results }))
    }

    fn close(&mut self) {
        for cursor in self.cursors.iter_mut() {
            cursor.close();
        }
    }
}

impl Drop for BlockRangeScanner {
    fn drop(&mut self) {
        self.close();
    }
}
