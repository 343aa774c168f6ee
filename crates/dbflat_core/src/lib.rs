//! # DBFlat Core
//!
//! Record layout engine for the DBFlat binary format.
//!
//! A record is a header, a vtable of `(tag, comp_flags, offset)` slots and a
//! data region, optionally followed by a cold section of self-delimiting
//! tag-walk tuples. A one-byte hot bitmap in the header lets up to eight
//! fields (tags 1 to 8) be read without touching the rest of the record.
//!
//! This crate provides:
//! - [`Encoder`] with three layout strategies ([`Strategy`])
//! - [`Decoder`] for full decodes, hot-field reads and tag-walk streams
//! - [`Builder`] for incremental construction
//! - [`Inspector`] for point lookups and cursor scans
//! - [`Schema`], a JSON width registry for fixed-width fields
//!
//! ## Usage
//!
//! ```
//! use dbflat_core::{Decoder, Encoder, Field, LayoutPlan, Strategy};
//!
//! let amount = 300_u32.to_le_bytes();
//! let fields = [
//!     Field::array(1, b"Hello I'm Test 1"),
//!     Field::array(2, b"Hello I'm Test 2"),
//!     Field::array(4, &amount),
//! ];
//! let plan = LayoutPlan::new(&fields[..])
//!     .strategy(Strategy::FullVTable)
//!     .hot_tags(&[1, 2])
//!     .schema_id(112);
//! let buf = Encoder::default().encode_to_vec(&plan).unwrap();
//!
//! let decoder = Decoder::default();
//! assert_eq!(&*decoder.read_hot_field(&buf, 1, 0).unwrap(), b"Hello I'm Test 1");
//! assert_eq!(decoder.decode_record(&buf).unwrap().payload(4), Some(&amount[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod builder;
mod config;
mod decoder;
mod encoder;
mod error;
mod field;
mod header;
mod inspector;
mod schema;
mod tagwalk;
mod vtable;

pub use adapter::{
    read_value, require_bytes, require_value, FieldList, FieldLookup, FieldSink, FromFields,
    ToFields,
};
pub use builder::Builder;
pub use config::{DecoderConfig, EncoderConfig, SharedWidths, Strategy};
pub use decoder::{DecodedRecord, Decoder};
pub use encoder::{EncodeArena, Encoder, LayoutPlan};
pub use error::{DbflatError, DbflatResult};
pub use field::{
    CompFlags, DecodedField, Field, FieldBuf, FieldSource, ARRAY_BIT, COMPRESSOR_MASK,
    RESERVED_MASK,
};
pub use header::{
    Header, HeaderFlags, HotBitmap, Layout, HEADER_SIZE, HEADER_SIZE_NO_SCHEMA, MAGIC,
    MAX_HOT_TAG, MAX_VTABLE_SLOTS, VERSION,
};
pub use inspector::Inspector;
pub use schema::{FieldSchema, FieldWidths, NoFixedWidths, Schema, VARIABLE_LENGTH};
pub use tagwalk::{CursorState, TagWalkCursor, TUPLE_HEADER_SIZE};
pub use vtable::{VTable, VTableSlot, SLOT_SIZE};

pub use dbflat_codec::{CompressorRegistry, FieldType, Value};
