//! History of one key restricted to a version range

use std::sync::Arc;

use tracing::warn;

use super::decoder::TxDecoder;
use super::errors::{HistoryError, HistoryResult};
use super::keys::{
    construct_data_key, construct_global_index_key, construct_range_scan, decode_global_index_value,
    decode_local_index, RangeScan, FIRST_VERSION,
};
use super::scanner::{fetch_key_modification, ResultsIterator};
use super::types::KeyModification;
use crate::blockstore::BlockStore;
use crate::kvstore::{OrderedStore, RangeIterator};

/// Reads the last recorded version of a key, 0 when it was never written.
pub(crate) fn read_last_version(
    index: &dyn OrderedStore,
    namespace: &str,
    key: &str,
) -> HistoryResult<u64> {
    match index.get(&construct_global_index_key(namespace, key))? {
        Some(value) => Ok(decode_global_index_value(&value)?),
        None => Ok(0),
    }
}

/// Versions `start..=end` of one key, newest to oldest.
///
/// The first index entry visited is the one covering `end`; yielding starts
/// at `end`'s offset inside that block's transaction list. Iteration stops
/// once the current version drops below `start`.
pub struct VersionRangeScanner {
    range_scan: RangeScan,
    namespace: String,
    key: String,
    itr: Option<Box<dyn RangeIterator>>,
    block_store: Arc<dyn BlockStore>,
    decoder: Arc<dyn TxDecoder>,
    start: u64,
    end: u64,
    positioned: bool,
    done: bool,
    block_num: u64,
    min_version: u64,
    tran_nums: Vec<u64>,
    remaining: usize,
}

impl VersionRangeScanner {
    /// Validates the bounds and opens the cursor.
    ///
    /// Fails with `InvalidRange` if `start > end`, `start` is below the first
    /// version, or `start` exceeds the key's last known version. An `end`
    /// past the last version is clamped to it.
    pub(crate) fn open(
        index: &dyn OrderedStore,
        block_store: Arc<dyn BlockStore>,
        decoder: Arc<dyn TxDecoder>,
        namespace: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> HistoryResult<Self> {
        if start > end {
            warn!(namespace, key, start, end, "rejected inverted version range");
            return Err(HistoryError::invalid_range(format!(
                "start version {} is greater than end version {}",
                start, end
            )));
        }
        if start < FIRST_VERSION {
            return Err(HistoryError::invalid_range(format!(
                "versions start at {}, got {}",
                FIRST_VERSION, start
            )));
        }

        let last_version = read_last_version(index, namespace, key)?;
        if start > last_version {
            warn!(
                namespace,
                key, start, last_version, "rejected version range past last version"
            );
            return Err(HistoryError::invalid_range(format!(
                "start version {} exceeds last version {}",
                start, last_version
            ))
            .with_details(format!("namespace: {}, key: {}", namespace, key)));
        }

        let range_scan = construct_range_scan(namespace, key);
        let itr = index.iterator(&range_scan.start_key, &range_scan.end_key)?;

        Ok(Self {
            range_scan,
            namespace: namespace.to_string(),
            key: key.to_string(),
            itr: Some(itr),
            block_store,
            decoder,
            start,
            end: end.min(last_version),
            positioned: false,
            done: false,
            block_num: 0,
            min_version: 0,
            tran_nums: Vec::new(),
            remaining: 0,
        })
    }

    /// Inclusive bounds after clamping.
    pub fn bounds(&self) -> (u64, u64) {
        (self.start, self.end)
    }

    /// Moves onto the entry covering `end`, or the previous entry after the
    /// first call.
    fn step(&mut self) -> HistoryResult<bool> {
        let itr = match self.itr.as_mut() {
            Some(itr) => itr,
            None => return Ok(false),
        };

        let first = !self.positioned;
        let found = if first {
            self.positioned = true;
            let past_end = self
                .end
                .checked_add(1)
                .map(|next| construct_data_key(&self.namespace, &self.key, next));
            match past_end {
                Some(past_end) if itr.seek(&past_end) => itr.prev(),
                _ => itr.last(),
            }
        } else {
            itr.prev()
        };
        if !found {
            if first {
                return Err(HistoryError::integrity_violation(
                    &self.namespace,
                    &self.key,
                    0,
                    0,
                )
                .with_details(format!(
                    "global index records version {} but no index entry covers it",
                    self.end
                )));
            }
            return Ok(false);
        }

        let data_key = itr
            .key()
            .ok_or_else(|| HistoryError::malformed_encoding("index cursor without a key"))?;
        let value = itr
            .value()
            .ok_or_else(|| HistoryError::malformed_encoding("index cursor without a value"))?;
        let min_version = self.range_scan.decode_min_version(data_key)?;
        let (block_num, tran_nums) = decode_local_index(value)?;

        self.remaining = if first {
            if min_version > self.end {
                return Err(HistoryError::malformed_encoding(format!(
                    "entry at version {} positioned for end version {}",
                    min_version, self.end
                )));
            }
            let offset = self.end - min_version;
            if offset < tran_nums.len() as u64 {
                offset as usize + 1
            } else {
                tran_nums.len()
            }
        } else {
            tran_nums.len()
        };
        self.block_num = block_num;
        self.min_version = min_version;
        self.tran_nums = tran_nums;
        Ok(true)
    }
}

impl ResultsIterator for VersionRangeScanner {
    type Item = KeyModification;

    fn next(&mut self) -> HistoryResult<Option<KeyModification>> {
        if self.done {
            return Ok(None);
        }
        if self.remaining == 0 && !self.step()? {
            self.done = true;
            return Ok(None);
        }

        let version = self.min_version + (self.remaining as u64 - 1);
        if version < self.start {
            self.done = true;
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

impl Drop for VersionRangeScanner {
    fn drop(&mut self) {
        self.close();
    }
}
