//! History index queries
//!
//! Reconstructs the modifications of a key from the history index without
//! re-reading the chain. The index maps each (namespace, key, minVersion)
//! DataKey to the block holding that version and the ascending transaction
//! numbers in that block that wrote the key; the GlobalIndex entry of a key
//! records its last version.
//!
//! # Scanners
//!
//! - [`HistoryScanner`]: one key, newest first
//! - [`MultiKeyHistoryScanner`]: several keys, each drained in turn
//! - [`VersionRangeScanner`]: one key between two versions, newest first
//! - [`BlockRangeScanner`]: keys above an update threshold, by ascending block
//!
//! Every scanner owns its range cursor(s) and releases them on `close()` or
//! drop. A transaction referenced by the index that does not write the key is
//! an integrity violation and ends the scan with an error.

mod block_range;
mod decoder;
mod errors;
mod executor;
mod keys;
mod multi;
mod scanner;
mod types;
mod versions;

pub use block_range::BlockRangeScanner;
pub use decoder::{RwSetDecoder, TxDecoder};
pub use errors::{HistoryError, HistoryErrorCode, HistoryResult, Severity};
pub use executor::QueryExecutor;
pub use keys::{
    construct_data_key, construct_global_index_key, construct_global_index_value,
    construct_local_index, construct_range_scan, decode_global_index_value, decode_local_index,
    RangeScan, Savepoint, COMPOSITE_KEY_SEP, FIRST_VERSION, GLOBAL_INDEX_MARKER,
    RANGE_END_MARKER, SAVEPOINT_KEY,
};
pub use multi::MultiKeyHistoryScanner;
pub use scanner::{HistoryScanner, Results, ResultsIterator};
pub use types::{KeyModification, QueryResultBatch};
pub use versions::VersionRangeScanner;
