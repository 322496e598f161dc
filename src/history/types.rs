//! History query results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One historical write of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyModification {
    pub tx_id: String,
    pub value: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub is_delete: bool,
}

/// Modifications of the qualifying keys within one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResultBatch {
    pub block_num: u64,
    pub results: Vec<KeyModification>,
}

impl QueryResultBatch {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
