//! Entry point for history queries

use std::sync::Arc;

use tracing::debug;

use super::block_range::BlockRangeScanner;
use super::decoder::{RwSetDecoder, TxDecoder};
use super::errors::{HistoryError, HistoryResult};
use super::keys::{construct_range_scan, Savepoint, COMPOSITE_KEY_SEP, SAVEPOINT_KEY};
use super::multi::MultiKeyHistoryScanner;
use super::scanner::HistoryScanner;
use super::versions::{read_last_version, VersionRangeScanner};
use crate::blockstore::BlockStore;
use crate::config::HistoryConfig;
use crate::kvstore::OrderedStore;

/// Rejects namespaces whose keys would land inside another namespace's range.
fn check_namespace(namespace: &str) -> HistoryResult<()> {
    if namespace.as_bytes().contains(&COMPOSITE_KEY_SEP) {
        return Err(HistoryError::invalid_range(
            "namespace must not contain the 0x00 key separator",
        )
        .with_details(format!("namespace: {:?}", namespace)));
    }
    Ok(())
}

/// Opens history scanners over an index store and the block store it
/// refers to.
///
/// The executor holds no per-query state; concurrent queries each get their
/// own scanner.
pub struct QueryExecutor {
    index: Arc<dyn OrderedStore>,
    block_store: Arc<dyn BlockStore>,
    decoder: Arc<dyn TxDecoder>,
    config: HistoryConfig,
}

impl QueryExecutor {
    pub fn new(
        index: Arc<dyn OrderedStore>,
        block_store: Arc<dyn BlockStore>,
        config: HistoryConfig,
    ) -> Self {
        Self::with_decoder(index, block_store, Arc::new(RwSetDecoder), config)
    }

    pub fn with_decoder(
        index: Arc<dyn OrderedStore>,
        block_store: Arc<dyn BlockStore>,
        decoder: Arc<dyn TxDecoder>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            index,
            block_store,
            decoder,
            config,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Every modification of `key`, newest first.
    pub fn get_history_for_key(
        &self,
        namespace: &str,
        key: &str,
    ) -> HistoryResult<HistoryScanner> {
        check_namespace(namespace)?;
        let range_scan = construct_range_scan(namespace, key);
        let itr = self
            .index
            .iterator(&range_scan.start_key, &range_scan.end_key)?;
        debug!(namespace, key, "opened history scan");
        Ok(HistoryScanner::new(
            namespace,
            key,
            itr,
            Arc::clone(&self.block_store),
            Arc::clone(&self.decoder),
        ))
    }

    /// History of each key in turn, in the order given.
    ///
    /// Cursors opened before a failure are released when the partially built
    /// scanners drop.
    pub fn get_history_for_keys(
        &self,
        namespace: &str,
        keys: &[&str],
    ) -> HistoryResult<MultiKeyHistoryScanner> {
        check_namespace(namespace)?;
        let scanners = keys
            .iter()
            .map(|key| self.get_history_for_key(namespace, key))
            .collect::<HistoryResult<Vec<_>>>()?;
        Ok(MultiKeyHistoryScanner::new(scanners))
    }

    /// Versions `start..=end` of `key`, newest first.
    pub fn get_versions_for_key(
        &self,
        namespace: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> HistoryResult<VersionRangeScanner> {
        check_namespace(namespace)?;
        VersionRangeScanner::open(
            self.index.as_ref(),
            Arc::clone(&self.block_store),
            Arc::clone(&self.decoder),
            namespace,
            key,
            start,
            end,
        )
    }

    /// Per-block updates of the keys written at least `min_updates` times in
    /// blocks `start..=end`.
    pub fn get_updates_by_block_range(
        &self,
        namespace: &str,
        start: u64,
        end: u64,
        min_updates: u64,
    ) -> HistoryResult<BlockRangeScanner> {
        check_namespace(namespace)?;
        BlockRangeScanner::open(
            self.index.as_ref(),
            Arc::clone(&self.block_store),
            Arc::clone(&self.decoder),
            namespace,
            start,
            end,
            min_updates,
            self.config.min_block_num,
        )
    }

    /// Last version recorded for `key`, 0 if it has none.
    pub fn last_version(&self, namespace: &str, key: &str) -> HistoryResult<u64> {
        check_namespace(namespace)?;
        read_last_version(self.index.as_ref(), namespace, key)
    }

    /// Highest position already reflected in the index.
    pub fn savepoint(&self) -> HistoryResult<Option<Savepoint>> {
        match self.index.get(SAVEPOINT_KEY)? {
            Some(bytes) => Ok(Some(Savepoint::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }
}
