//! LEB128 unsigned varints.
//!
//! Seven payload bits per byte, least-significant group first. The high
//! bit of every byte except the last is set. A `u64` needs at most ten
//! bytes.

use crate::error::{CodecError, CodecResult};

/// Maximum encoded length of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append `value` to `out` as a varint, returning the number of bytes written.
pub fn write_varuint(out: &mut Vec<u8>, mut value: u64) -> usize {
    let start = out.len();
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
    out.len() - start
}

/// Number of bytes `value` occupies once varint-encoded.
#[must_use]
pub const fn varuint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Read a varint from the front of `bytes`.
///
/// Returns `(value, bytes_consumed)`. A sequence that never terminates
/// within `bytes`, or that does not fit in 64 bits, yields `(0, 0)`.
#[must_use]
pub fn read_varuint(bytes: &[u8]) -> (u64, usize) {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        let group = u64::from(byte & 0x7f);
        // The tenth byte may only carry the single remaining bit.
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return (0, 0);
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return (value, i + 1);
        }
        shift += 7;
    }
    (0, 0)
}

/// Like [`read_varuint`] but reports failure as [`CodecError::TruncatedVarint`].
///
/// # Errors
///
/// Returns an error if the varint is unterminated or overlong.
pub fn decode_varuint(bytes: &[u8]) -> CodecResult<(u64, usize)> {
    match read_varuint(bytes) {
        (_, 0) => Err(CodecError::TruncatedVarint),
        ok => Ok(ok),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_varuint(&mut out, value);
        out
    }

    #[test]
    fn single_byte_values() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(127), vec![0x7f]);
    }

    #[test]
    fn multi_byte_values() {
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xac, 0x02]);
        assert_eq!(encode(16_384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn max_value_uses_ten_bytes() {
        let bytes = encode(u64::MAX);
        assert_eq!(bytes.len(), MAX_VARINT_LEN);
        assert_eq!(read_varuint(&bytes), (u64::MAX, MAX_VARINT_LEN));
    }

    #[test]
    fn encoded_len_matches_writer() {
        for value in [0, 1, 127, 128, 300, 1 << 21, 1 << 56, u64::MAX] {
            assert_eq!(varuint_len(value), encode(value).len(), "value {value}");
        }
    }

    #[test]
    fn read_reports_consumed_bytes() {
        let bytes = [0xac, 0x02, 0xff];
        assert_eq!(read_varuint(&bytes), (300, 2));
    }

    #[test]
    fn truncated_sequence_reads_as_zero() {
        assert_eq!(read_varuint(&[]), (0, 0));
        assert_eq!(read_varuint(&[0x80]), (0, 0));
        assert_eq!(read_varuint(&[0xff, 0xff]), (0, 0));
    }

    #[test]
    fn overlong_sequence_is_rejected() {
        let bytes = [0xff; 11];
        assert_eq!(read_varuint(&bytes), (0, 0));
        let mut too_big = [0xff; 10];
        too_big[9] = 0x02;
        assert_eq!(read_varuint(&too_big), (0, 0));
    }

    #[test]
    fn decode_maps_truncation_to_error() {
        assert_eq!(decode_varuint(&[0x80]), Err(CodecError::TruncatedVarint));
        assert_eq!(decode_varuint(&[0x05]), Ok((5, 1)));
    }
}
