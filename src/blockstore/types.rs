//! Block and transaction model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{
    decode_order_preserving_var_u64, encode_order_preserving_var_u64, CodecError, CodecResult,
};

/// A single key write inside a namespace write set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvWrite {
    pub key: String,
    pub value: Vec<u8>,
    pub is_delete: bool,
}

impl KvWrite {
    /// A write that sets `key` to `value`.
    pub fn put(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_delete: false,
        }
    }

    /// A write that deletes `key`.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            is_delete: true,
        }
    }
}

/// All writes a transaction made to one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsWriteSet {
    pub namespace: String,
    pub writes: Vec<KvWrite>,
}

/// A committed transaction as stored in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub write_sets: Vec<NsWriteSet>,
}

impl TransactionEnvelope {
    /// Creates a transaction with no writes.
    pub fn new(tx_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            tx_id: tx_id.into(),
            timestamp,
            write_sets: Vec::new(),
        }
    }

    /// Adds `write` to the write set of `namespace`, creating it if needed.
    pub fn with_write(mut self, namespace: &str, write: KvWrite) -> Self {
        match self.write_sets.iter_mut().find(|ws| ws.namespace == namespace) {
            Some(ws) => ws.writes.push(write),
            None => self.write_sets.push(NsWriteSet {
                namespace: namespace.to_string(),
                writes: vec![write],
            }),
        }
        self
    }

    /// Write set for `namespace`, if the transaction touched it.
    pub fn write_set(&self, namespace: &str) -> Option<&NsWriteSet> {
        self.write_sets.iter().find(|ws| ws.namespace == namespace)
    }
}

/// A block of ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub transactions: Vec<TransactionEnvelope>,
}

impl Block {
    pub fn new(number: u64, transactions: Vec<TransactionEnvelope>) -> Self {
        Self {
            number,
            transactions,
        }
    }
}

/// Identifies a transaction by block number and position in the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockTxPair {
    pub block_num: u64,
    pub tran_num: u64,
}

impl BlockTxPair {
    pub fn new(block_num: u64, tran_num: u64) -> Self {
        Self {
            block_num,
            tran_num,
        }
    }
}

/// Byte range of a transaction record inside the block file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileLocPointer {
    pub offset: u64,
    pub length: u64,
}

impl FileLocPointer {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// `encode(offset) ‖ encode(length)`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = encode_order_preserving_var_u64(self.offset);
        out.extend(encode_order_preserving_var_u64(self.length));
        out
    }

    /// Inverse of [`to_bytes`](Self::to_bytes). Trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let (offset, n) = decode_order_preserving_var_u64(bytes)?;
        let (length, m) = decode_order_preserving_var_u64(&bytes[n..])?;
        if n + m != bytes.len() {
            return Err(CodecError::MalformedVarint(format!(
                "location pointer has {} trailing bytes",
                bytes.len() - n - m
            )));
        }
        Ok(Self { offset, length })
    }
}
