//! Record encoder.
//!
//! # Layout
//!
//! ```text
//! FullVTable / HotVTable:
//! ┌────────┬──────────────────┬──────────────────┬──────────────────┐
//! │ header │ vtable (8B/slot) │ data (slot order)│ cold tuples      │
//! └────────┴──────────────────┴──────────────────┴──────────────────┘
//!
//! TagWalk:
//! ┌──────────┬──────────┬─────┐
//! │ tuple 0  │ tuple 1  │ ... │
//! └──────────┴──────────┴─────┘
//! ```
//!
//! Vtable slots and cold tuples are sorted by tag; tag-walk streams keep
//! the input order. The [`Encoder`] itself is immutable and can be shared
//! across threads; all per-call scratch lives in an [`EncodeArena`].

use crate::config::{EncoderConfig, Strategy};
use crate::error::{DbflatError, DbflatResult};
use crate::field::{write_body, FieldSource};
use crate::header::{Header, HeaderFlags, HotBitmap, MAX_VTABLE_SLOTS, VERSION};
use crate::tagwalk::write_tuple;
use crate::vtable::{VTableSlot, SLOT_SIZE};
use tracing::trace;

/// Everything that describes one record to encode.
pub struct LayoutPlan<'p, S: ?Sized> {
    /// Fields to encode.
    pub fields: &'p S,
    /// Layout strategy.
    pub strategy: Strategy,
    /// Tags to mark hot; only tags in `1..=8` that are present count.
    pub hot_tags: &'p [u16],
    /// Header flags. The schema-id bit decides whether `schema_id` is written.
    pub flags: HeaderFlags,
    /// Schema identifier.
    pub schema_id: u64,
}

impl<S: ?Sized> Clone for LayoutPlan<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for LayoutPlan<'_, S> {}

impl<'p, S: ?Sized> LayoutPlan<'p, S> {
    /// A full-vtable plan for `fields` with no hot tags and no schema id.
    #[must_use]
    pub const fn new(fields: &'p S) -> Self {
        Self {
            fields,
            strategy: Strategy::FullVTable,
            hot_tags: &[],
            flags: HeaderFlags::NONE,
            schema_id: 0,
        }
    }

    /// Sets the layout strategy.
    #[must_use]
    pub const fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the hot tags.
    #[must_use]
    pub const fn hot_tags(mut self, hot_tags: &'p [u16]) -> Self {
        self.hot_tags = hot_tags;
        self
    }

    /// Sets the header flags.
    #[must_use]
    pub const fn flags(mut self, flags: HeaderFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets or clears 8-byte payload alignment.
    #[must_use]
    pub const fn align(mut self, align: bool) -> Self {
        self.flags = if align {
            self.flags.union(HeaderFlags::ALIGN8)
        } else {
            self.flags.difference(HeaderFlags::ALIGN8)
        };
        self
    }

    /// Writes `schema_id` into the header.
    #[must_use]
    pub const fn schema_id(mut self, schema_id: u64) -> Self {
        self.schema_id = schema_id;
        self.flags = self.flags.union(HeaderFlags::SCHEMA_ID);
        self
    }
}

/// Reusable scratch for encoding.
#[derive(Debug, Default)]
pub struct EncodeArena {
    order: Vec<usize>,
    vtable: Vec<u8>,
    data: Vec<u8>,
    cold: Vec<u8>,
    staging: Vec<u8>,
    out: Vec<u8>,
}

impl EncodeArena {
    /// An empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An arena with room for records of about `bytes` bytes.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            out: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Bytes produced by the last [`Encoder::encode`].
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.out
    }
}

/// Encodes field lists into records.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    /// Creates an encoder.
    #[must_use]
    pub const fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// The encoder's configuration.
    #[must_use]
    pub const fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode into the arena's output buffer, replacing its contents.
    ///
    /// # Errors
    ///
    /// As [`Encoder::encode_into`].
    pub fn encode<'a, S: FieldSource + ?Sized>(
        &self,
        plan: &LayoutPlan<'_, S>,
        arena: &'a mut EncodeArena,
    ) -> DbflatResult<&'a [u8]> {
        let mut out = std::mem::take(&mut arena.out);
        out.clear();
        let result = self.encode_into(plan, arena, &mut out);
        arena.out = out;
        result?;
        Ok(&arena.out)
    }

    /// Encode into a fresh vector.
    ///
    /// # Errors
    ///
    /// As [`Encoder::encode_into`].
    pub fn encode_to_vec<S: FieldSource + ?Sized>(
        &self,
        plan: &LayoutPlan<'_, S>,
    ) -> DbflatResult<Vec<u8>> {
        let mut arena = EncodeArena::new();
        let mut out = Vec::new();
        self.encode_into(plan, &mut arena, &mut out)?;
        Ok(out)
    }

    /// Append one encoded record to `out`, returning the bytes written.
    ///
    /// On error `out` is left as it was.
    ///
    /// # Errors
    ///
    /// - [`DbflatError::DuplicateTag`] if a tag repeats
    /// - [`DbflatError::InvalidCompFlags`] if reserved flag bits are set
    /// - [`DbflatError::WidthMismatch`] if width validation is on and fails
    /// - [`DbflatError::UnknownCompressor`] for an unregistered compressor
    /// - [`DbflatError::LayoutOverflow`] if the record exceeds header limits
    pub fn encode_into<S: FieldSource + ?Sized>(
        &self,
        plan: &LayoutPlan<'_, S>,
        arena: &mut EncodeArena,
        out: &mut Vec<u8>,
    ) -> DbflatResult<usize> {
        let start = out.len();
        match self.encode_record(plan, arena, out) {
            Ok(()) => {
                let written = out.len() - start;
                trace!(
                    strategy = %plan.strategy,
                    fields = plan.fields.field_count(),
                    bytes = written,
                    "encoded record"
                );
                Ok(written)
            }
            Err(err) => {
                out.truncate(start);
                Err(err)
            }
        }
    }

    fn encode_record<S: FieldSource + ?Sized>(
        &self,
        plan: &LayoutPlan<'_, S>,
        arena: &mut EncodeArena,
        out: &mut Vec<u8>,
    ) -> DbflatResult<()> {
        let EncodeArena {
            order,
            vtable,
            data,
            cold,
            staging,
            ..
        } = arena;
        let fields = plan.fields;
        let registry = &self.config.compressors;
        self.sort_and_validate(fields, order)?;

        cold.clear();
        if plan.strategy == Strategy::TagWalk {
            for i in 0..fields.field_count() {
                write_tuple(cold, fields.field(i), registry, staging)?;
            }
            out.extend_from_slice(cold);
            return Ok(());
        }

        vtable.clear();
        data.clear();
        let requested: HotBitmap = plan.hot_tags.iter().copied().collect();
        let align = plan.flags.is_aligned();
        let mut hot = HotBitmap::EMPTY;
        let mut slots = 0usize;

        for &i in order.iter() {
            let field = fields.field(i);
            let in_vtable =
                plan.strategy == Strategy::FullVTable || requested.contains(field.tag);
            if !in_vtable {
                write_tuple(cold, field, registry, staging)?;
                continue;
            }
            if slots == MAX_VTABLE_SLOTS {
                return Err(DbflatError::LayoutOverflow {
                    what: "more than 255 vtable slots",
                });
            }
            if align {
                data.resize(data.len().next_multiple_of(8), 0);
            }
            let offset = u32::try_from(data.len()).map_err(|_| DbflatError::LayoutOverflow {
                what: "field offset beyond u32",
            })?;
            write_body(data, field, registry, staging)?;
            VTableSlot {
                tag: field.tag,
                comp_flags: field.comp_flags,
                offset,
            }
            .encode_into(vtable);
            if requested.contains(field.tag) {
                hot.insert(field.tag);
            }
            slots += 1;
        }

        let flags = plan.flags.difference(HeaderFlags::INDEX);
        let header_size = Header::size_for(flags);
        let data_offset = header_size + slots * SLOT_SIZE;
        let cold_start = data_offset + data.len();
        let record_len = u32::try_from(cold_start + cold.len()).map_err(|_| {
            DbflatError::LayoutOverflow {
                what: "record longer than u32",
            }
        })?;

        let header = Header {
            version: VERSION,
            flags,
            schema_id: flags.has_schema_id().then_some(plan.schema_id),
            hot_bitmap: hot,
            vtable_slots: slots as u8,
            data_offset: u16::try_from(data_offset).map_err(|_| DbflatError::LayoutOverflow {
                what: "data offset beyond u16",
            })?,
            vtable_off: header_size as u32,
            record_len,
            cold_offset: if cold.is_empty() {
                0
            } else {
                cold_start as u32
            },
        };

        out.reserve(record_len as usize);
        header.encode_into(out);
        out.extend_from_slice(vtable);
        out.extend_from_slice(data);
        out.extend_from_slice(cold);
        Ok(())
    }

    /// Fill `order` with field indices sorted by tag, rejecting bad input.
    fn sort_and_validate<S: FieldSource + ?Sized>(
        &self,
        fields: &S,
        order: &mut Vec<usize>,
    ) -> DbflatResult<()> {
        let count = fields.field_count();
        order.clear();
        order.extend(0..count);

        for i in 0..count {
            let field = fields.field(i);
            field.comp_flags.validate(field.tag)?;
            if field.comp_flags.is_length_prefixed() {
                continue;
            }
            if let Some(widths) = &self.config.widths {
                if let Some(expected) = widths.fixed_width(field.tag) {
                    if expected != field.payload.len() {
                        return Err(DbflatError::WidthMismatch {
                            tag: field.tag,
                            expected,
                            actual: field.payload.len(),
                        });
                    }
                }
            }
        }

        order.sort_by_key(|&i| fields.field(i).tag);
        for pair in order.windows(2) {
            let tag = fields.field(pair[0]).tag;
            if tag == fields.field(pair[1]).tag {
                return Err(DbflatError::DuplicateTag { tag });
            }
        }
        Ok(())
    }
}
