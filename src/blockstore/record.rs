//! Block file record format
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole record including this field)
//! +------------------+
//! | Block Number     | (u64 LE)
//! +------------------+
//! | Tran Number      | (u64 LE)
//! +------------------+
//! | Payload Length   | (u32 LE)
//! +------------------+
//! | Payload          | (JSON transaction envelope)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself.

use crc32fast::Hasher;

use super::errors::{BlockStoreError, BlockStoreResult};

/// Fixed bytes in every record: length, block, tran, payload length, checksum.
pub const RECORD_OVERHEAD: usize = 4 + 8 + 8 + 4 + 4;

fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// One transaction as stored in the block file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub block_num: u64,
    pub tran_num: u64,
    pub payload: Vec<u8>,
}

impl TxRecord {
    pub fn new(block_num: u64, tran_num: u64, payload: Vec<u8>) -> Self {
        Self {
            block_num,
            tran_num,
            payload,
        }
    }

    /// Total encoded size.
    pub fn encoded_len(&self) -> usize {
        RECORD_OVERHEAD + self.payload.len()
    }

    /// Serializes the record with its length prefix and checksum.
    pub fn serialize(&self) -> Vec<u8> {
        let total = self.encoded_len();
        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.extend_from_slice(&self.block_num.to_le_bytes());
        buf.extend_from_slice(&self.tran_num.to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        let checksum = crc32(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Parses a record from the front of `buf`, which was read at file
    /// offset `offset` (used for error context only).
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(buf: &[u8], offset: u64) -> BlockStoreResult<(Self, usize)> {
        if buf.len() < RECORD_OVERHEAD {
            return Err(BlockStoreError::corruption(
                offset,
                format!(
                    "record too short: {} bytes, minimum is {}",
                    buf.len(),
                    RECORD_OVERHEAD
                ),
            ));
        }

        let total = read_u32(buf, 0) as usize;
        if total < RECORD_OVERHEAD || total > buf.len() {
            return Err(BlockStoreError::corruption(
                offset,
                format!("invalid record length {} (buffer {})", total, buf.len()),
            ));
        }

        let payload_len = read_u32(buf, 20) as usize;
        if RECORD_OVERHEAD + payload_len != total {
            return Err(BlockStoreError::corruption(
                offset,
                format!(
                    "payload length {} inconsistent with record length {}",
                    payload_len, total
                ),
            ));
        }

        let checksum = read_u32(buf, total - 4);
        if crc32(&buf[..total - 4]) != checksum {
            return Err(BlockStoreError::corruption(offset, "checksum mismatch"));
        }

        let record = TxRecord {
            block_num: read_u64(buf, 4),
            tran_num: read_u64(buf, 12),
            payload: buf[24..24 + payload_len].to_vec(),
        };
        Ok((record, total))
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TxRecord {
        TxRecord::new(12, 3, br#"{"tx_id":"abc"}"#.to_vec())
    }

    #[test]
    fn test_serialize_deserialize() {
        let record = sample();
        let bytes = record.serialize();
        assert_eq!(bytes.len(), record.encoded_len());

        let (decoded, consumed) = TxRecord::deserialize(&bytes, 0).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_deserialize_ignores_following_record() {
        let mut bytes = sample().serialize();
        let first_len = bytes.len();
        bytes.extend(TxRecord::new(12, 4, vec![1, 2, 3]).serialize());

        let (_, consumed) = TxRecord::deserialize(&bytes, 0).unwrap();
        assert_eq!(consumed, first_len);
    }

    #[test]
    fn test_payload_corruption_detected() {
        let mut bytes = sample().serialize();
        bytes[26] ^= 0xFF;
        let err = TxRecord::deserialize(&bytes, 64).unwrap_err();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("offset 64"));
    }

    #[test]
    fn test_truncated_record_detected() {
        let bytes = sample().serialize();
        let err = TxRecord::deserialize(&bytes[..bytes.len() - 1], 0).unwrap_err();
        assert!(err.is_corruption());
    }
}
