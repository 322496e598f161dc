//! Variable-length, order-preserving u64 encoding

use super::errors::{CodecError, CodecResult};

/// Maximum number of bytes produced by [`encode_order_preserving_var_u64`].
pub const MAX_ENCODED_LEN: usize = 9;

/// Encodes `value` so that byte-wise comparison of encodings matches numeric
/// comparison of values.
pub fn encode_order_preserving_var_u64(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let size = bytes.len() - skip;

    let mut out = Vec::with_capacity(size + 1);
    out.push(size as u8);
    out.extend_from_slice(&bytes[skip..]);
    out
}

/// Decodes a value from the front of `buf`.
///
/// Returns the value and the number of bytes consumed. Trailing bytes after
/// the encoding are left for the caller.
///
/// # Errors
///
/// `MalformedVarint` if the buffer is empty, truncated, declares more than
/// eight significant bytes, or carries a leading zero byte.
pub fn decode_order_preserving_var_u64(buf: &[u8]) -> CodecResult<(u64, usize)> {
    let size = match buf.first() {
        Some(b) => *b as usize,
        None => return Err(CodecError::malformed("empty buffer")),
    };

    if size > 8 {
        return Err(CodecError::malformed(format!(
            "size byte {} exceeds 8 significant bytes",
            size
        )));
    }

    if buf.len() < size + 1 {
        return Err(CodecError::malformed(format!(
            "truncated: need {} bytes, have {}",
            size + 1,
            buf.len()
        )));
    }

    let significant = &buf[1..=size];
    if significant.first() == Some(&0) {
        return Err(CodecError::malformed("non-canonical leading zero byte"));
    }

    let mut padded = [0u8; 8];
    padded[8 - size..].copy_from_slice(significant);
    Ok((u64::from_be_bytes(padded), size + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode_order_preserving_var_u64(0), vec![0x00]);
        assert_eq!(encode_order_preserving_var_u64(1), vec![0x01, 0x01]);
        assert_eq!(encode_order_preserving_var_u64(255), vec![0x01, 0xFF]);
        assert_eq!(encode_order_preserving_var_u64(256), vec![0x02, 0x01, 0x00]);
        assert_eq!(
            encode_order_preserving_var_u64(u64::MAX),
            vec![0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut buf = encode_order_preserving_var_u64(70_000);
        buf.extend_from_slice(&[0xAA, 0xBB]);

        let (value, consumed) = decode_order_preserving_var_u64(&buf).unwrap();
        assert_eq!(value, 70_000);
        assert_eq!(consumed, buf.len() - 2);
    }

    #[test]
    fn test_decode_empty_fails() {
        let err = decode_order_preserving_var_u64(&[]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedVarint(_)));
    }

    #[test]
    fn test_decode_truncated_fails() {
        let buf = encode_order_preserving_var_u64(1 << 40);
        let err = decode_order_preserving_var_u64(&buf[..buf.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedVarint(_)));
    }

    #[test]
    fn test_decode_oversized_fails() {
        let err = decode_order_preserving_var_u64(&[0x09, 1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap_err();
        assert!(err.to_string().contains("exceeds 8"));
    }

    #[test]
    fn test_decode_non_canonical_fails() {
        let err = decode_order_preserving_var_u64(&[0x02, 0x00, 0x05]).unwrap_err();
        assert!(err.to_string().contains("leading zero"));
    }

    #[test]
    fn test_first_byte_never_ff() {
        for v in [0u64, 1, 255, 256, 1 << 32, u64::MAX] {
            assert_ne!(encode_order_preserving_var_u64(v)[0], 0xFF);
        }
    }

    proptest! {
        #[test]
        fn order_preserved(a in any::<u64>(), b in any::<u64>()) {
            let ea = encode_order_preserving_var_u64(a);
            let eb = encode_order_preserving_var_u64(b);
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }

        #[test]
        fn decode_inverts_encode(v in any::<u64>()) {
            let encoded = encode_order_preserving_var_u64(v);
            prop_assert!(encoded.len() <= MAX_ENCODED_LEN);
            let (decoded, consumed) = decode_order_preserving_var_u64(&encoded).unwrap();
            prop_assert_eq!(decoded, v);
            prop_assert_eq!(consumed, encoded.len());
        }
    }
}
