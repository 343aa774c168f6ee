//! # DBFlat Codec
//!
//! Leaf codecs used by the DBFlat record format:
//!
//! - little-endian fixed-width scalars ([`write_fixed`], [`read_fixed`])
//! - LEB128 varints for lengths and counts ([`write_varuint`], [`read_varuint`])
//! - the per-field compression adapter ([`CompressorRegistry`], [`compress`],
//!   [`decompress`])
//!
//! Nothing here knows about headers or vtables; see `dbflat_core` for the
//! record layout engine.
//!
//! ## Usage
//!
//! ```
//! use dbflat_codec::{read_fixed, read_varuint, write_fixed, write_varuint};
//!
//! let bytes = write_fixed(300_u32);
//! assert_eq!(read_fixed::<u32>(&bytes).unwrap(), 300);
//!
//! let mut len = Vec::new();
//! write_varuint(&mut len, 300);
//! assert_eq!(read_varuint(&len), (300, 2));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod compress;
mod error;
mod primitive;
mod varint;

pub use compress::{
    compress, decompress, Compressor, CompressorRegistry, COMP_HUFFMAN, COMP_RAW, COMP_RESERVED,
    COMP_RLE, COMP_ZSTD, ZSTD_MAX_OUTPUT,
};
pub use error::{CodecError, CodecResult};
pub use primitive::{read_fixed, write_fixed, write_fixed_into, FieldType, FixedWidth, Value};
pub use varint::{decode_varuint, read_varuint, varuint_len, write_varuint, MAX_VARINT_LEN};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn varuint_roundtrip(value in any::<u64>()) {
            let mut out = Vec::new();
            let written = write_varuint(&mut out, value);
            prop_assert_eq!(written, varuint_len(value));
            prop_assert_eq!(read_varuint(&out), (value, written));
        }

        #[test]
        fn varuint_prefix_never_decodes(value in 128u64.., cut in 1usize..10) {
            let mut out = Vec::new();
            write_varuint(&mut out, value);
            let cut = cut.min(out.len() - 1);
            prop_assert_eq!(read_varuint(&out[..cut]), (0, 0));
        }

        #[test]
        fn f64_bits_roundtrip(bits in any::<u64>()) {
            let value = f64::from_bits(bits);
            let back = read_fixed::<f64>(&write_fixed(value)).unwrap();
            prop_assert_eq!(back.to_bits(), bits);
        }

        #[test]
        fn compressors_roundtrip(
            raw in prop::collection::vec(any::<u8>(), 0..512),
            id in prop::sample::select(vec![COMP_RAW, COMP_RLE, COMP_HUFFMAN, COMP_ZSTD]),
        ) {
            let blob = compress(id, &raw).unwrap();
            prop_assert_eq!(decompress(id, &blob, Some(raw.len())).unwrap(), raw);
        }

        #[test]
        fn decompress_never_panics(
            blob in prop::collection::vec(any::<u8>(), 0..300),
            id in 0u8..16,
        ) {
            let _ = decompress(id, &blob, None);
        }
    }
}
