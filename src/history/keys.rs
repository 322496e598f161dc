//! History index key and value encoding
//!
//! ```text
//! DataKey      = ns ‖ 0x00 ‖ enc(len(key)) ‖ key ‖ 0x00 ‖ enc(minVersion)
//! GlobalKey    = ns ‖ 0x00 ‖ enc(len(key)) ‖ key ‖ 0x01
//! LocalIndex   = enc(blockNum) ‖ enc(tx_0) ‖ enc(tx_1) ‖ ...
//! GlobalValue  = enc(lastVersion)
//! Savepoint    = enc(blockNum) ‖ enc(tranNum)      stored under "s"
//! ```
//!
//! Byte order of DataKeys equals order by (ns, key, minVersion). Versions
//! start at 1, so a range scan begins at `DataKey(ns, key, 1)` and ends at
//! `ns ‖ 0x00 ‖ enc(len(key)) ‖ key ‖ 0x00 ‖ 0xFF`, which sorts after every
//! version suffix. Namespaces must not contain 0x00.

use crate::codec::{
    decode_order_preserving_var_u64, encode_order_preserving_var_u64, CodecError, CodecResult,
};

/// Separates the components of a composite key.
pub const COMPOSITE_KEY_SEP: u8 = 0x00;

/// Marks the GlobalIndex entry of a (namespace, key) pair.
pub const GLOBAL_INDEX_MARKER: u8 = 0x01;

/// Terminates a range scan; never the first byte of an encoded version.
pub const RANGE_END_MARKER: u8 = 0xFF;

/// Single reserved key holding the savepoint.
pub const SAVEPOINT_KEY: &[u8] = b"s";

/// First version number of every key.
pub const FIRST_VERSION: u64 = 1;

fn key_path(namespace: &str, key: &str) -> Vec<u8> {
    debug_assert!(!namespace.as_bytes().contains(&COMPOSITE_KEY_SEP));
    let mut path = Vec::with_capacity(namespace.len() + key.len() + 11);
    path.extend_from_slice(namespace.as_bytes());
    path.push(COMPOSITE_KEY_SEP);
    path.extend(encode_order_preserving_var_u64(key.len() as u64));
    path.extend_from_slice(key.as_bytes());
    path
}

/// Builds the index key of the entry whose lowest covered version is
/// `min_version`.
pub fn construct_data_key(namespace: &str, key: &str, min_version: u64) -> Vec<u8> {
    let mut data_key = key_path(namespace, key);
    data_key.push(COMPOSITE_KEY_SEP);
    data_key.extend(encode_order_preserving_var_u64(min_version));
    data_key
}

/// Builds the key of the (namespace, key) last-version entry.
pub fn construct_global_index_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut global_key = key_path(namespace, key);
    global_key.push(GLOBAL_INDEX_MARKER);
    global_key
}

/// Encodes the last known version of a key.
pub fn construct_global_index_value(last_version: u64) -> Vec<u8> {
    encode_order_preserving_var_u64(last_version)
}

/// Decodes a GlobalIndex value. Trailing bytes are rejected.
pub fn decode_global_index_value(value: &[u8]) -> CodecResult<u64> {
    let (last_version, consumed) = decode_order_preserving_var_u64(value)?;
    if consumed != value.len() {
        return Err(CodecError::malformed(format!(
            "global index value has {} trailing bytes",
            value.len() - consumed
        )));
    }
    Ok(last_version)
}

/// Encodes the transactions of one block that wrote a key.
pub fn construct_local_index(block_num: u64, tran_nums: &[u64]) -> Vec<u8> {
    let mut value = encode_order_preserving_var_u64(block_num);
    for tran_num in tran_nums {
        value.extend(encode_order_preserving_var_u64(*tran_num));
    }
    value
}

/// Decodes a LocalIndex value into the block number and its transaction
/// numbers.
///
/// The list must be non-empty and strictly ascending.
pub fn decode_local_index(value: &[u8]) -> CodecResult<(u64, Vec<u64>)> {
    let (block_num, mut pos) = decode_order_preserving_var_u64(value)?;

    let mut tran_nums = Vec::new();
    while pos < value.len() {
        let (tran_num, consumed) = decode_order_preserving_var_u64(&value[pos..])?;
        if let Some(prev) = tran_nums.last() {
            if tran_num <= *prev {
                return Err(CodecError::malformed(format!(
                    "transaction list of block {} not ascending: {} after {}",
                    block_num, tran_num, prev
                )));
            }
        }
        tran_nums.push(tran_num);
        pos += consumed;
    }

    if tran_nums.is_empty() {
        return Err(CodecError::malformed(format!(
            "local index for block {} lists no transactions",
            block_num
        )));
    }
    Ok((block_num, tran_nums))
}

/// Bounds covering every DataKey of one (namespace, key) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeScan {
    /// DataKey bytes before the version suffix
    prefix: Vec<u8>,
    /// Inclusive lower bound
    pub start_key: Vec<u8>,
    /// Exclusive upper bound
    pub end_key: Vec<u8>,
}

impl RangeScan {
    /// Recovers the version suffix of a DataKey inside this range.
    ///
    /// Fails with `KeyDecoding` when the key does not carry this range's
    /// prefix, and with `MalformedVarint` when the suffix is not exactly one
    /// encoded version.
    pub fn decode_min_version(&self, data_key: &[u8]) -> CodecResult<u64> {
        let suffix = data_key.strip_prefix(self.prefix.as_slice()).ok_or_else(|| {
            CodecError::key_decoding(format!(
                "key of {} bytes does not share the range scan prefix",
                data_key.len()
            ))
        })?;

        let (version, consumed) = decode_order_preserving_var_u64(suffix)?;
        if consumed != suffix.len() {
            return Err(CodecError::malformed(format!(
                "data key has {} bytes after the version",
                suffix.len() - consumed
            )));
        }
        Ok(version)
    }
}

/// Builds the scan bounds for every indexed version of `key`.
pub fn construct_range_scan(namespace: &str, key: &str) -> RangeScan {
    let mut prefix = key_path(namespace, key);
    prefix.push(COMPOSITE_KEY_SEP);

    let mut start_key = prefix.clone();
    start_key.extend(encode_order_preserving_var_u64(FIRST_VERSION));

    let mut end_key = prefix.clone();
    end_key.push(RANGE_END_MARKER);

    RangeScan {
        prefix,
        start_key,
        end_key,
    }
}

/// Highest position already reflected in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Savepoint {
    pub block_num: u64,
    pub tran_num: u64,
}

impl Savepoint {
    pub fn new(block_num: u64, tran_num: u64) -> Self {
        Self {
            block_num,
            tran_num,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = encode_order_preserving_var_u64(self.block_num);
        bytes.extend(encode_order_preserving_var_u64(self.tran_num));
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let (block_num, n) = decode_order_preserving_var_u64(bytes)?;
        let (tran_num, m) = decode_order_preserving_var_u64(&bytes[n..])?;
        if n + m != bytes.len() {
            return Err(CodecError::malformed(format!(
                "savepoint has {} trailing bytes",
                bytes.len() - n - m
            )));
        }
        Ok(Self {
            block_num,
            tran_num,
        })
    }
}
