//! Incremental record construction.

use crate::config::Strategy;
use crate::encoder::{EncodeArena, Encoder, LayoutPlan};
use crate::error::DbflatResult;
use crate::field::{CompFlags, Field, FieldSource};
use crate::header::{HeaderFlags, HotBitmap};
use dbflat_codec::Value;
use std::ops::Range;

#[derive(Debug, Clone)]
struct PendingField {
    tag: u16,
    comp_flags: CompFlags,
    hot: bool,
    payload: Range<usize>,
}

/// Pending fields; payloads share one byte buffer.
#[derive(Debug, Default)]
struct PendingFields {
    entries: Vec<PendingField>,
    bytes: Vec<u8>,
}

impl FieldSource for PendingFields {
    fn field_count(&self) -> usize {
        self.entries.len()
    }

    fn field(&self, index: usize) -> Field<'_> {
        let entry = &self.entries[index];
        Field::new(entry.tag, entry.comp_flags, &self.bytes[entry.payload.clone()])
    }
}

/// Accumulates fields and commits them as full-vtable records.
///
/// Committed records are appended to one output buffer, so several
/// records can be built back to back before [`Builder::output`] is read.
/// Pending fields survive a commit; [`Builder::reset`] clears everything.
///
/// ```
/// use dbflat_core::{Builder, CompFlags, Decoder, HeaderFlags};
///
/// let mut builder = Builder::new();
/// builder
///     .add_field(1, CompFlags::ARRAY, b"alice", true)
///     .add_field(2, CompFlags::ARRAY, b"bob", false);
/// let record = builder.commit(112, HeaderFlags::SCHEMA_ID).unwrap().to_vec();
///
/// let hot = Decoder::default().read_hot_field(&record, 1, 0).unwrap();
/// assert_eq!(&*hot, b"alice");
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    encoder: Encoder,
    arena: EncodeArena,
    pending: PendingFields,
    hot_tags: Vec<u16>,
    out: Vec<u8>,
}

impl Builder {
    /// A builder using the default encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder using `encoder`.
    #[must_use]
    pub fn with_encoder(encoder: Encoder) -> Self {
        Self {
            encoder,
            ..Self::default()
        }
    }

    /// Queue a field. `payload` is copied.
    pub fn add_field(
        &mut self,
        tag: u16,
        comp_flags: impl Into<CompFlags>,
        payload: &[u8],
        hot: bool,
    ) -> &mut Self {
        let start = self.pending.bytes.len();
        self.pending.bytes.extend_from_slice(payload);
        self.pending.entries.push(PendingField {
            tag,
            comp_flags: comp_flags.into(),
            hot,
            payload: start..self.pending.bytes.len(),
        });
        self
    }

    /// Queue a typed value, variable-length types get the array bit.
    pub fn add_value(&mut self, tag: u16, value: &Value, hot: bool) -> &mut Self {
        let comp_flags = if value.field_type().is_variable() {
            CompFlags::ARRAY
        } else {
            CompFlags::RAW
        };
        let start = self.pending.bytes.len();
        value.write_payload(&mut self.pending.bytes);
        self.pending.entries.push(PendingField {
            tag,
            comp_flags,
            hot,
            payload: start..self.pending.bytes.len(),
        });
        self
    }

    /// Number of queued fields.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.entries.len()
    }

    /// Encode the queued fields and append the record to the output.
    ///
    /// The hot set is every queued field flagged hot whose tag is in
    /// `1..=8`. `schema_id` is written when `flags` has the schema-id bit.
    /// Returns the bytes of the record just committed.
    ///
    /// # Errors
    ///
    /// As [`Encoder::encode_into`]; on error the output is unchanged.
    pub fn commit(&mut self, schema_id: u64, flags: HeaderFlags) -> DbflatResult<&[u8]> {
        self.hot_tags.clear();
        self.hot_tags.extend(
            self.pending
                .entries
                .iter()
                .filter(|entry| entry.hot && HotBitmap::in_range(entry.tag))
                .map(|entry| entry.tag),
        );
        let plan = LayoutPlan {
            fields: &self.pending,
            strategy: Strategy::FullVTable,
            hot_tags: &self.hot_tags,
            flags,
            schema_id,
        };
        let start = self.out.len();
        self.encoder
            .encode_into(&plan, &mut self.arena, &mut self.out)?;
        Ok(&self.out[start..])
    }

    /// Every record committed since the last reset.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.out
    }

    /// Drop queued fields and committed output, keeping allocations.
    pub fn reset(&mut self) {
        self.pending.entries.clear();
        self.pending.bytes.clear();
        self.hot_tags.clear();
        self.out.clear();
    }
}
