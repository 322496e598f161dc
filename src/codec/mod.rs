//! Order-preserving integer codec
//!
//! Every composite key in the history index is built from this encoding, so
//! range scans over the ordered store return entries in numeric order.
//!
//! # Format
//!
//! ```text
//! +-----------+------------------------------+
//! | size (u8) | big-endian significant bytes |
//! +-----------+------------------------------+
//! ```
//!
//! `size` is the number of significant bytes (0..=8). Zero encodes as the
//! single byte `0x00`. Leading zero bytes are never written.
//!
//! # Invariants
//!
//! - `a < b` implies `encode(a) < encode(b)` under lexicographic byte order
//! - `decode(encode(u)) == (u, encode(u).len())`
//! - The first byte of an encoding is never `0xFF`

mod errors;
mod varint;

pub use errors::{CodecError, CodecResult};
pub use varint::{
    decode_order_preserving_var_u64, encode_order_preserving_var_u64, MAX_ENCODED_LEN,
};
