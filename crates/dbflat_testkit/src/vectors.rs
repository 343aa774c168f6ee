//! Byte-exact test vectors for the record format.
//!
//! Each vector pins the encoding of a small field set so that any change
//! to the layout shows up as a vector failure. Vectors serialize to JSON
//! for use by other implementations.

use dbflat_core::{CompFlags, FieldBuf, HeaderFlags, Strategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One field of a vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorField {
    /// Field tag.
    pub tag: u16,
    /// Raw comp_flags.
    pub comp_flags: u16,
    /// Raw payload (hex-encoded).
    pub payload_hex: String,
    /// Fixed width to register for decoding, if the field is fixed-width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<usize>,
}

/// An encoder input and the exact bytes it must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Strategy name.
    pub strategy: String,
    /// Fields in encoder input order.
    pub fields: Vec<VectorField>,
    /// Tags requested hot.
    pub hot_tags: Vec<u16>,
    /// Header flags word.
    pub flags: u16,
    /// Schema id, written when the flags carry the schema-id bit.
    pub schema_id: u64,
    /// Expected encoding (hex-encoded).
    pub expected_hex: String,
}

impl RecordVector {
    /// Fields as encoder input.
    ///
    /// # Panics
    ///
    /// Panics on malformed hex; vectors are fixed data.
    #[must_use]
    pub fn field_bufs(&self) -> Vec<FieldBuf> {
        self.fields
            .iter()
            .map(|f| {
                FieldBuf::new(
                    f.tag,
                    CompFlags::from_bits(f.comp_flags),
                    hex::decode(&f.payload_hex).expect("vector payload hex"),
                )
            })
            .collect()
    }

    /// Widths of the fixed-width fields.
    #[must_use]
    pub fn widths(&self) -> HashMap<u16, usize> {
        self.fields
            .iter()
            .filter_map(|f| f.width.map(|w| (f.tag, w)))
            .collect()
    }

    /// Parsed strategy.
    ///
    /// # Panics
    ///
    /// Panics on an unknown strategy name.
    #[must_use]
    pub fn layout_strategy(&self) -> Strategy {
        self.strategy.parse().expect("vector strategy name")
    }

    /// Parsed header flags.
    #[must_use]
    pub const fn header_flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits(self.flags)
    }

    /// Expected bytes.
    ///
    /// # Panics
    ///
    /// Panics on malformed hex.
    #[must_use]
    pub fn expected(&self) -> Vec<u8> {
        hex::decode(&self.expected_hex).expect("vector expected hex")
    }
}

fn field(tag: u16, comp_flags: u16, payload: &[u8], width: Option<usize>) -> VectorField {
    VectorField {
        tag,
        comp_flags,
        payload_hex: hex::encode(payload),
        width,
    }
}

/// Record format test vectors.
#[must_use]
pub fn record_vectors() -> Vec<RecordVector> {
    vec![
        RecordVector {
            id: "full_single_hot".into(),
            description: "One hot array field, no schema id".into(),
            strategy: "full".into(),
            fields: vec![field(1, 0x8000, b"hi", None)],
            hot_tags: vec![1],
            flags: 0,
            schema_id: 0,
            expected_hex: concat!(
                "33464244", "0001", "0000", // magic, version, flags
                "01", "01", "2800", "20000000", // hot, slots, data_offset, vtable_off
                "2b000000", "00000000", "0000000000000000", // record_len, cold_offset
                "0100008000000000", // slot: tag 1, array, offset 0
                "026869",
            )
            .into(),
        },
        RecordVector {
            id: "full_schema_id_fixed".into(),
            description: "Fixed-width u32 under schema id 112".into(),
            strategy: "full".into(),
            fields: vec![field(3, 0, &300u32.to_le_bytes(), Some(4))],
            hot_tags: vec![],
            flags: 0x0002,
            schema_id: 112,
            expected_hex: concat!(
                "33464244", "0001", "0200", "7000000000000000",
                "00", "01", "3000", "28000000",
                "34000000", "00000000", "0000000000000000",
                "0300000000000000",
                "2c010000",
            )
            .into(),
        },
        RecordVector {
            id: "hot_with_cold_section".into(),
            description: "Hot tag 1 in the vtable, tag 9 in the cold section".into(),
            strategy: "hot".into(),
            fields: vec![field(9, 0x8000, b"b", None), field(1, 0x8000, b"a", None)],
            hot_tags: vec![1],
            flags: 0,
            schema_id: 0,
            expected_hex: concat!(
                "33464244", "0001", "0000",
                "01", "01", "2800", "20000000",
                "30000000", "2a000000", "0000000000000000",
                "0100008000000000",
                "0161",
                "090000800162",
            )
            .into(),
        },
        RecordVector {
            id: "tagwalk_rle_and_fixed".into(),
            description: "RLE array then a fixed-width u32, input order kept".into(),
            strategy: "tagwalk".into(),
            fields: vec![
                field(2, 0x8001, b"aaaa", None),
                field(3, 0, &300u32.to_le_bytes(), Some(4)),
            ],
            hot_tags: vec![],
            flags: 0,
            schema_id: 0,
            expected_hex: concat!("0200018002", "0461", "03000000", "2c010000").into(),
        },
        RecordVector {
            id: "full_aligned".into(),
            description: "Eight-byte alignment pads before the u64".into(),
            strategy: "full".into(),
            fields: vec![
                field(2, 0, &1u64.to_le_bytes(), Some(8)),
                field(1, 0x8000, b"abc", None),
            ],
            hot_tags: vec![],
            flags: 0x0001,
            schema_id: 0,
            expected_hex: concat!(
                "33464244", "0001", "0100",
                "00", "02", "3000", "20000000",
                "40000000", "00000000", "0000000000000000",
                "0100008000000000", "0200000008000000",
                "03616263", "00000000", "0100000000000000",
            )
            .into(),
        },
    ]
}

/// Returns all vectors as JSON.
///
/// # Panics
///
/// Panics if serialization fails, which it cannot for these types.
#[must_use]
pub fn all_vectors_json() -> String {
    serde_json::to_string_pretty(&record_vectors()).expect("vectors serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbflat_core::{Decoder, Encoder, LayoutPlan};
    use std::sync::Arc;

    fn encode(vector: &RecordVector) -> Vec<u8> {
        let fields = vector.field_bufs();
        let plan = LayoutPlan::new(&fields)
            .strategy(vector.layout_strategy())
            .hot_tags(&vector.hot_tags)
            .flags(vector.header_flags());
        let plan = if vector.header_flags().has_schema_id() {
            plan.schema_id(vector.schema_id)
        } else {
            plan
        };
        Encoder::default().encode_to_vec(&plan).unwrap()
    }

    #[test]
    fn vectors_encode_exactly() {
        for vector in record_vectors() {
            assert_eq!(
                hex::encode(encode(&vector)),
                vector.expected_hex,
                "vector {}: {}",
                vector.id,
                vector.description
            );
        }
    }

    #[test]
    fn vectors_decode_to_their_fields() {
        for vector in record_vectors() {
            let decoder = Decoder::with_widths(Arc::new(vector.widths()));
            let bytes = vector.expected();
            let record = decoder.decode_any(&bytes).unwrap();
            assert_eq!(record.len(), vector.fields.len(), "vector {}", vector.id);
            for field in vector.field_bufs() {
                assert_eq!(
                    record.payload(field.tag),
                    Some(&field.payload[..]),
                    "vector {} tag {}",
                    vector.id,
                    field.tag
                );
            }
        }
    }

    #[test]
    fn vectors_json_roundtrip() {
        let json = all_vectors_json();
        let parsed: Vec<RecordVector> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), record_vectors().len());
        assert!(json.contains("tagwalk_rle_and_fixed"));
    }
}
