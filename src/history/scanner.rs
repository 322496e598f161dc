//! Result iteration and the single-key history scanner

use std::sync::Arc;

use tracing::{debug, error};

use super::decoder::TxDecoder;
use super::errors::{HistoryError, HistoryResult};
use super::keys::decode_local_index;
use super::types::KeyModification;
use crate::blockstore::BlockStore;
use crate::kvstore::RangeIterator;

/// Lazy, finite, forward-only sequence of query results.
///
/// Scanners are single-owner: no method may be called concurrently on the
/// same instance. `close()` releases the underlying range cursor and must be
/// reached on every exit path; dropping a scanner closes it. Calling `next()`
/// after `close()` is a caller error.
pub trait ResultsIterator {
    type Item;

    /// Produces the next result, `Ok(None)` at the end of the sequence.
    fn next(&mut self) -> HistoryResult<Option<Self::Item>>;

    /// Releases the range cursor(s).
    fn close(&mut self);

    /// Adapts the scanner into a std [`Iterator`].
    fn into_results(self) -> Results<Self>
    where
        Self: Sized,
    {
        Results {
            scanner: self,
            finished: false,
        }
    }
}

/// [`Iterator`] over a scanner's results.
///
/// Yields each error once and then ends. The scanner is closed when the
/// sequence ends or the adapter is dropped.
pub struct Results<S: ResultsIterator> {
    scanner: S,
    finished: bool,
}

impl<S: ResultsIterator> Iterator for Results<S> {
    type Item = HistoryResult<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.scanner.next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                self.scanner.close();
                None
            }
            Err(err) => {
                self.finished = true;
                self.scanner.close();
                Some(Err(err))
            }
        }
    }
}

/// Resolves one indexed (block, tx) pair to the key's modification.
///
/// A transaction that does not write the key means the index and the ledger
/// disagree; that is reported, never skipped.
pub(crate) fn fetch_key_modification(
    block_store: &dyn BlockStore,
    decoder: &dyn TxDecoder,
    namespace: &str,
    key: &str,
    block_num: u64,
    tran_num: u64,
) -> HistoryResult<KeyModification> {
    debug!(namespace, key, block_num, tran_num, "found history record");

    let envelope = block_store.retrieve_tx_by_block_num_tran_num(block_num, tran_num)?;
    match decoder.extract_key_modification(&envelope, namespace, key)? {
        Some(modification) => {
            debug!(
                namespace,
                key,
                tx_id = %modification.tx_id,
                "found historic key value"
            );
            Ok(modification)
        }
        None => {
            error!(
                namespace,
                key,
                block_num,
                tran_num,
                "indexed transaction does not write key"
            );
            Err(HistoryError::integrity_violation(
                namespace, key, block_num, tran_num,
            ))
        }
    }
}

/// History of one key, newest to oldest.
///
/// The cursor starts one past the last index entry and walks backwards. Each
/// entry lists the block's transactions that wrote the key in ascending
/// order; they are yielded back to front.
pub struct HistoryScanner {
    namespace: String,
    key: String,
    itr: Option<Box<dyn RangeIterator>>,
    block_store: Arc<dyn BlockStore>,
    decoder: Arc<dyn TxDecoder>,
    block_num: u64,
    tran_nums: Vec<u64>,
    remaining: usize,
}

impl HistoryScanner {
    pub(crate) fn new(
        namespace: &str,
        key: &str,
        mut itr: Box<dyn RangeIterator>,
        block_store: Arc<dyn BlockStore>,
        decoder: Arc<dyn TxDecoder>,
    ) -> Self {
        if itr.last() {
            itr.next();
        }
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            itr: Some(itr),
            block_store,
            decoder,
            block_num: 0,
            tran_nums: Vec::new(),
            remaining: 0,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn load_previous_entry(&mut self) -> HistoryResult<bool> {
        let itr = match self.itr.as_mut() {
            Some(itr) => itr,
            None => return Ok(false),
        };
        if !itr.prev() {
            return Ok(false);
        }

        let value = itr.value().ok_or_else(|| {
            HistoryError::malformed_encoding("index cursor positioned without a value")
        })?;
        let (block_num, tran_nums) = decode_local_index(value)?;

        self.block_num = block_num;
        self.remaining = tran_nums.len();
        self.tran_nums = tran_nums;
        Ok(true)
    }
}

impl ResultsIterator for HistoryScanner {
    type Item = KeyModification;

    fn next(&mut self) -> HistoryResult<Option<KeyModification>> {
        if self.remaining == 0 && !self.load_previous_entry()? {
            return Ok(None);
        }

        self.remaining -= 1;
        let tran_num = self.tran_nums[self.remaining];
        fetch_key_modification(
            self.block_store.as_ref(),
            self.decoder.as_ref(),
            &self.namespace,
            &self.key,
            self.block_num,
            tran_num,
        )
        .map(Some)
    }

    fn close(&mut self) {
        if let Some(mut itr) = self.itr.take() {
            itr.release();
        }
    }
}

impl Drop for HistoryScanner {
    fn drop(&mut self) {
        self.close();
    }
}
