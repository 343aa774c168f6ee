//! Record decoder.
//!
//! The decoder never copies a raw payload: results borrow the input
//! buffer and only decompressed payloads are owned. Decoding is read-only,
//! so one [`Decoder`] can serve any number of threads.

use crate::config::{DecoderConfig, SharedWidths};
use crate::error::{DbflatError, DbflatResult};
use crate::field::{materialize, read_body, DecodedField};
use crate::header::{Header, HotBitmap, Layout};
use crate::tagwalk::{read_raw_tuple, RawTuple};
use crate::vtable::{VTable, VTableSlot};
use std::borrow::Cow;
use tracing::debug;

/// Fields of one decoded record, sorted by tag.
///
/// Reusable through [`Decoder::decode_record_into`]; [`DecodedRecord::recycle`]
/// keeps the allocation when moving on to a buffer with another lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    header: Option<Header>,
    fields: Vec<DecodedField<'a>>,
}

impl<'a> DecodedRecord<'a> {
    /// An empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            header: None,
            fields: Vec::new(),
        }
    }

    /// The header, absent for tag-walk streams.
    #[must_use]
    pub const fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Schema id from the header, if any.
    #[must_use]
    pub fn schema_id(&self) -> Option<u64> {
        self.header.and_then(|header| header.schema_id)
    }

    /// All fields in tag order.
    #[must_use]
    pub fn fields(&self) -> &[DecodedField<'a>] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field with `tag`.
    #[must_use]
    pub fn get(&self, tag: u16) -> Option<&DecodedField<'a>> {
        self.fields
            .binary_search_by_key(&tag, |field| field.tag)
            .ok()
            .map(|i| &self.fields[i])
    }

    /// Payload of `tag`.
    #[must_use]
    pub fn payload(&self, tag: u16) -> Option<&[u8]> {
        self.get(tag).map(|field| &*field.payload)
    }

    /// Whether `tag` was decoded.
    #[must_use]
    pub fn contains(&self, tag: u16) -> bool {
        self.get(tag).is_some()
    }

    /// Iterate fields in tag order.
    pub fn iter(&self) -> std::slice::Iter<'_, DecodedField<'a>> {
        self.fields.iter()
    }

    /// Take the fields out.
    #[must_use]
    pub fn into_fields(self) -> Vec<DecodedField<'a>> {
        self.fields
    }

    /// Drop all fields, keeping the allocation.
    pub fn clear(&mut self) {
        self.header = None;
        self.fields.clear();
    }

    /// Empty this record and rebind it to a new buffer lifetime, keeping
    /// the allocation.
    #[must_use]
    pub fn recycle<'b>(mut self) -> DecodedRecord<'b> {
        self.fields.clear();
        DecodedRecord {
            header: None,
            fields: self.fields.into_iter().filter_map(|_| None).collect(),
        }
    }

    /// Sort by tag and reject repeats.
    fn finish(&mut self) -> DbflatResult<()> {
        self.fields.sort_by_key(|field| field.tag);
        for pair in self.fields.windows(2) {
            if pair[0].tag == pair[1].tag {
                return Err(DbflatError::DuplicateTag { tag: pair[0].tag });
            }
        }
        Ok(())
    }
}

impl<'r, 'a> IntoIterator for &'r DecodedRecord<'a> {
    type Item = &'r DecodedField<'a>;
    type IntoIter = std::slice::Iter<'r, DecodedField<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Decodes records and tag-walk streams.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Creates a decoder.
    #[must_use]
    pub const fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// A decoder with the built-in compressors and the given widths.
    #[must_use]
    pub fn with_widths(widths: SharedWidths) -> Self {
        Self::new(DecoderConfig::new().widths(widths))
    }

    /// The decoder's configuration.
    #[must_use]
    pub const fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Parse and validate the header of the record at the start of `buf`,
    /// returning it with the record's end offset.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::MalformedHeader`] or [`DbflatError::OutOfBounds`].
    pub fn header(&self, buf: &[u8]) -> DbflatResult<(Header, usize)> {
        let header = Header::parse(buf)?;
        let end = header.record_end(buf.len())?;
        Ok((header, end))
    }

    /// Decode every field of a header-bearing record.
    ///
    /// # Errors
    ///
    /// As [`Decoder::decode_record_into`].
    pub fn decode_record<'a>(&self, buf: &'a [u8]) -> DbflatResult<DecodedRecord<'a>> {
        let mut record = DecodedRecord::new();
        self.decode_record_into(buf, &mut record)?;
        Ok(record)
    }

    /// Decode every field of a header-bearing record into `out`, replacing
    /// its contents.
    ///
    /// Fixed-width vtable fields with no known width are skipped. On error
    /// `out` is left empty.
    ///
    /// # Errors
    ///
    /// - [`DbflatError::MalformedHeader`] for a bad header
    /// - [`DbflatError::OutOfBounds`] or [`DbflatError::TruncatedVarint`]
    ///   for truncated input
    /// - [`DbflatError::UnknownCompressor`] for an unregistered compressor
    /// - [`DbflatError::UnknownFieldWidth`] for an unknown fixed-width cold tuple
    /// - [`DbflatError::DuplicateTag`] if a tag repeats
    pub fn decode_record_into<'a>(
        &self,
        buf: &'a [u8],
        out: &mut DecodedRecord<'a>,
    ) -> DbflatResult<()> {
        out.clear();
        let result = self.decode_record_fields(buf, out);
        if result.is_err() {
            out.clear();
        }
        result
    }

    fn decode_record_fields<'a>(
        &self,
        buf: &'a [u8],
        out: &mut DecodedRecord<'a>,
    ) -> DbflatResult<()> {
        let (header, end) = self.header(buf)?;
        let buf = &buf[..end];
        let vtable = VTable::new(buf, &header)?;
        out.fields.reserve(vtable.len());

        for slot in vtable.iter() {
            slot.comp_flags.validate(slot.tag)?;
            let width = if slot.comp_flags.is_length_prefixed() {
                None
            } else if let Some(width) = self.config.widths.fixed_width(slot.tag) {
                Some(width)
            } else {
                debug!(tag = slot.tag, "skipping fixed-width field with unknown width");
                continue;
            };
            out.fields.push(self.read_slot(buf, &header, end, slot, width)?);
        }

        if header.has_cold_section() {
            let mut pos = header.cold_offset as usize;
            while let Some((field, next)) = self.read_tuple(buf, pos, end)? {
                out.fields.push(field);
                pos = next;
            }
        }
        out.header = Some(header);
        out.finish()
    }

    /// Read a hot field without touching any other field.
    ///
    /// `width` is the payload width when the field is fixed-width; zero
    /// defers to the decoder's width registry.
    ///
    /// # Errors
    ///
    /// - [`DbflatError::InvalidHotTag`] if `tag` is outside `1..=8`
    /// - [`DbflatError::NotHot`] if the bitmap does not contain `tag`
    /// - [`DbflatError::MissingSlot`] if no slot carries an advertised tag
    /// - [`DbflatError::UnknownFieldWidth`] for a fixed field of unknown width
    /// - bounds and compressor errors as for [`Decoder::decode_record`]
    pub fn read_hot_field<'a>(
        &self,
        buf: &'a [u8],
        tag: u16,
        width: usize,
    ) -> DbflatResult<Cow<'a, [u8]>> {
        if !HotBitmap::in_range(tag) {
            return Err(DbflatError::InvalidHotTag { tag });
        }
        let (header, end) = self.header(buf)?;
        if !header.hot_bitmap.contains(tag) {
            return Err(DbflatError::NotHot { tag });
        }
        let buf = &buf[..end];
        let vtable = VTable::new(buf, &header)?;
        let slot = locate_hot_slot(&vtable, header.hot_bitmap, tag)?;
        slot.comp_flags.validate(tag)?;
        let width = if slot.comp_flags.is_length_prefixed() {
            None
        } else if width > 0 {
            Some(width)
        } else {
            Some(
                self.config
                    .widths
                    .fixed_width(tag)
                    .ok_or(DbflatError::UnknownFieldWidth { tag })?,
            )
        };
        self.read_slot(buf, &header, end, slot, width)
            .map(|field| field.payload)
    }

    /// Decode the tag-walk tuple at `start`.
    ///
    /// Returns `Ok(None)` at the end of the stream, otherwise the field and
    /// the offset of the next tuple.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::OutOfBounds`] or [`DbflatError::TruncatedVarint`]
    /// for truncated input, [`DbflatError::UnknownFieldWidth`] for a fixed
    /// tuple of unknown width, or a compressor error.
    pub fn decode_tag_walk<'a>(
        &self,
        buf: &'a [u8],
        start: usize,
    ) -> DbflatResult<Option<(DecodedField<'a>, usize)>> {
        if start > buf.len() {
            return Err(DbflatError::out_of_bounds("tuple", start, buf.len()));
        }
        self.read_tuple(buf, start, buf.len())
    }

    /// Decode a whole header-less stream.
    ///
    /// # Errors
    ///
    /// As [`Decoder::decode_tag_walk`], plus [`DbflatError::DuplicateTag`].
    pub fn decode_tag_walk_all<'a>(&self, buf: &'a [u8]) -> DbflatResult<DecodedRecord<'a>> {
        let mut record = DecodedRecord::new();
        let mut pos = 0;
        while let Some((field, next)) = self.read_tuple(buf, pos, buf.len())? {
            record.fields.push(field);
            pos = next;
        }
        record.finish()?;
        Ok(record)
    }

    /// Scan a header-less stream for `tag`, decompressing only that field.
    ///
    /// # Errors
    ///
    /// As [`Decoder::decode_tag_walk`] for any tuple before the match.
    pub fn find_with_tag<'a>(&self, buf: &'a [u8], tag: u16) -> DbflatResult<Option<Cow<'a, [u8]>>> {
        self.find_in_range(buf, 0, buf.len(), tag)
    }

    /// Decode `buf` whatever its layout.
    ///
    /// # Errors
    ///
    /// As [`Decoder::decode_record`] or [`Decoder::decode_tag_walk_all`].
    pub fn decode_any<'a>(&self, buf: &'a [u8]) -> DbflatResult<DecodedRecord<'a>> {
        match Layout::detect(buf) {
            Layout::Record => self.decode_record(buf),
            Layout::TagWalk => self.decode_tag_walk_all(buf),
        }
    }

    /// Find `tag` in a header-bearing record: a linear scan of the vtable
    /// slots, then of the cold section.
    ///
    /// A fixed-width vtable field with no known width reads as absent, the
    /// same as in [`Decoder::decode_record`].
    ///
    /// # Errors
    ///
    /// As [`Decoder::decode_record`].
    pub fn lookup_field<'a>(&self, buf: &'a [u8], tag: u16) -> DbflatResult<Option<Cow<'a, [u8]>>> {
        let (header, end) = self.header(buf)?;
        let buf = &buf[..end];
        let vtable = VTable::new(buf, &header)?;
        if let Some(slot) = vtable.iter().find(|slot| slot.tag == tag) {
            slot.comp_flags.validate(tag)?;
            let width = if slot.comp_flags.is_length_prefixed() {
                None
            } else if let Some(width) = self.config.widths.fixed_width(tag) {
                Some(width)
            } else {
                debug!(tag, "fixed-width field with unknown width reads as absent");
                return Ok(None);
            };
            return self
                .read_slot(buf, &header, end, slot, width)
                .map(|field| Some(field.payload));
        }
        if header.has_cold_section() {
            return self.find_in_range(buf, header.cold_offset as usize, end, tag);
        }
        Ok(None)
    }

    /// Tuple at `start` within `[start, limit)`, decompressed.
    pub(crate) fn read_tuple<'a>(
        &self,
        buf: &'a [u8],
        start: usize,
        limit: usize,
    ) -> DbflatResult<Option<(DecodedField<'a>, usize)>> {
        let Some((raw, next)) = read_raw_tuple(buf, start, limit, &*self.config.widths)? else {
            return Ok(None);
        };
        Ok(Some((self.materialize_tuple(raw)?, next)))
    }

    /// Scan tuples in `[start, limit)` for `tag`.
    pub(crate) fn find_in_range<'a>(
        &self,
        buf: &'a [u8],
        start: usize,
        limit: usize,
        tag: u16,
    ) -> DbflatResult<Option<Cow<'a, [u8]>>> {
        let mut pos = start;
        while let Some((raw, next)) = read_raw_tuple(buf, pos, limit, &*self.config.widths)? {
            if raw.tag == tag {
                return self.materialize_tuple(raw).map(|field| Some(field.payload));
            }
            pos = next;
        }
        Ok(None)
    }

    fn materialize_tuple<'a>(&self, raw: RawTuple<'a>) -> DbflatResult<DecodedField<'a>> {
        Ok(DecodedField {
            tag: raw.tag,
            comp_flags: raw.comp_flags,
            payload: materialize(raw.stored, raw.comp_flags, &self.config.compressors)?,
        })
    }

    /// Read the payload a vtable slot points at.
    fn read_slot<'a>(
        &self,
        buf: &'a [u8],
        header: &Header,
        end: usize,
        slot: VTableSlot,
        width: Option<usize>,
    ) -> DbflatResult<DecodedField<'a>> {
        let mut ptr = usize::from(header.data_offset) + slot.offset as usize;
        if header.flags.is_aligned() {
            ptr = ptr.next_multiple_of(8);
        }
        let limit = header.data_end(end);
        let (stored, _) = read_body(buf, ptr, limit, slot.tag, slot.comp_flags, width)?;
        Ok(DecodedField {
            tag: slot.tag,
            comp_flags: slot.comp_flags,
            payload: materialize(stored, slot.comp_flags, &self.config.compressors)?,
        })
    }
}

/// Find the slot for hot `tag`: dense index, then bitmap rank, then a
/// binary search over the sorted vtable.
fn locate_hot_slot(vtable: &VTable<'_>, bitmap: HotBitmap, tag: u16) -> DbflatResult<VTableSlot> {
    let dense = usize::from(tag - 1);
    let rank = bitmap.rank(tag);
    for index in [dense, rank] {
        if let Some(slot) = vtable.get(index).filter(|slot| slot.tag == tag) {
            return Ok(slot);
        }
    }
    vtable
        .find(tag)
        .map(|(_, slot)| slot)
        .ok_or(DbflatError::MissingSlot { tag })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncoderConfig, Strategy};
    use crate::encoder::{Encoder, LayoutPlan};
    use crate::field::{CompFlags, Field};
    use dbflat_codec::compress::Zstd;
    use dbflat_codec::{CodecError, CompressorRegistry, COMP_HUFFMAN, COMP_RLE, COMP_ZSTD};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn encode(fields: &[Field<'_>], strategy: Strategy, hot: &[u16]) -> Vec<u8> {
        let plan = LayoutPlan::new(fields).strategy(strategy).hot_tags(hot);
        Encoder::default().encode_to_vec(&plan).unwrap()
    }

    fn widths(pairs: &[(u16, usize)]) -> Decoder {
        let map: HashMap<u16, usize> = pairs.iter().copied().collect();
        Decoder::with_widths(Arc::new(map))
    }

    #[test]
    fn full_vtable_roundtrip() {
        let amount = 300u32.to_le_bytes();
        let fields = [
            Field::array(2, b"receiver"),
            Field::fixed(4, &amount),
            Field::array(1, b"sender"),
        ];
        let buf = encode(&fields, Strategy::FullVTable, &[1, 2]);
        let record = widths(&[(4, 4)]).decode_record(&buf).unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.payload(1), Some(&b"sender"[..]));
        assert_eq!(record.payload(2), Some(&b"receiver"[..]));
        assert_eq!(record.payload(4), Some(&amount[..]));
        assert!(matches!(record.get(1).unwrap().payload, Cow::Borrowed(_)));
    }

    #[test]
    fn hot_vtable_roundtrip_includes_cold() {
        let fields = [
            Field::array(1, b"a"),
            Field::array(5, b"e"),
            Field::array(2, b"b"),
            Field::array(40, b"cold"),
        ];
        let buf = encode(&fields, Strategy::HotVTable, &[2, 5]);
        let record = Decoder::default().decode_record(&buf).unwrap();
        let tags: Vec<u16> = record.iter().map(|field| field.tag).collect();
        assert_eq!(tags, vec![1, 2, 5, 40]);
        assert_eq!(record.payload(40), Some(&b"cold"[..]));
    }

    #[test]
    fn compressed_fields_decode_owned() {
        let text = b"Heavy Data Heavy Data Heavy Data Heavy Data".to_vec();
        let fields = [
            Field::new(1, CompFlags::array(COMP_RLE), &text),
            Field::new(2, CompFlags::array(COMP_HUFFMAN), &text),
            Field::new(3, CompFlags::array(COMP_ZSTD), &text),
        ];
        for strategy in [Strategy::FullVTable, Strategy::HotVTable, Strategy::TagWalk] {
            let buf = encode(&fields, strategy, &[1]);
            let record = Decoder::default().decode_any(&buf).unwrap();
            for tag in 1..=3 {
                let field = record.get(tag).unwrap();
                assert_eq!(&*field.payload, &text[..], "{strategy} tag {tag}");
                assert!(matches!(field.payload, Cow::Owned(_)));
            }
        }
    }

    #[test]
    fn unknown_compressor_is_reported() {
        let fields = [Field::new(1, CompFlags::array(COMP_HUFFMAN), b"abc")];
        let buf = encode(&fields, Strategy::FullVTable, &[]);
        let decoder = Decoder::new(DecoderConfig::new().compressors(CompressorRegistry::raw_only()));
        assert!(matches!(
            decoder.decode_record(&buf),
            Err(DbflatError::UnknownCompressor { id: 2 })
        ));
    }

    #[test]
    fn unknown_fixed_width_vtable_fields_are_skipped() {
        let flag = [1u8];
        let fields = [Field::array(1, b"known"), Field::fixed(9, &flag)];
        let buf = encode(&fields, Strategy::FullVTable, &[]);
        let record = Decoder::default().decode_record(&buf).unwrap();
        assert_eq!(record.len(), 1);
        assert!(!record.contains(9));
    }

    #[test]
    fn lookup_agrees_with_full_decode_on_unknown_widths() {
        let flag = [1u8];
        let fields = [
            Field::fixed(3, &flag),
            Field::array(5, b"five"),
            Field::array(30, b"cold"),
        ];
        let buf = encode(&fields, Strategy::HotVTable, &[3, 5]);
        let decoder = Decoder::default();
        let record = decoder.decode_record(&buf).unwrap();
        for tag in [3, 5, 30] {
            let looked_up = decoder.lookup_field(&buf, tag).unwrap();
            assert_eq!(looked_up.as_deref(), record.payload(tag), "tag {tag}");
        }
        assert_eq!(
            widths(&[(3, 1)]).lookup_field(&buf, 3).unwrap().as_deref(),
            Some(&flag[..])
        );
    }

    #[test]
    fn zstd_output_ceiling_comes_from_the_registry() {
        let text = vec![b'z'; 8 * 1024];
        let fields = [Field::new(1, CompFlags::array(COMP_ZSTD), &text)];
        let buf = encode(&fields, Strategy::FullVTable, &[]);

        let mut registry = CompressorRegistry::with_builtins();
        registry
            .register(COMP_ZSTD, Arc::new(Zstd::default().max_output(1024)))
            .unwrap();
        let capped = Decoder::new(DecoderConfig::new().compressors(registry));
        assert!(matches!(
            capped.decode_record(&buf),
            Err(DbflatError::Codec(CodecError::OutputTooLarge { limit: 1024, .. }))
        ));
        assert_eq!(Decoder::default().decode_record(&buf).unwrap().payload(1), Some(&text[..]));
    }

    #[test]
    fn unknown_fixed_width_cold_tuple_is_an_error() {
        let flag = [1u8];
        let fields = [Field::array(1, b"hot"), Field::fixed(9, &flag)];
        let buf = encode(&fields, Strategy::HotVTable, &[1]);
        assert!(matches!(
            Decoder::default().decode_record(&buf),
            Err(DbflatError::UnknownFieldWidth { tag: 9 })
        ));
        assert_eq!(widths(&[(9, 1)]).decode_record(&buf).unwrap().len(), 2);
    }

    #[test]
    fn hot_read_dense_tags() {
        let fields = [
            Field::array(1, b"one"),
            Field::array(2, b"two"),
            Field::array(3, b"three"),
        ];
        let buf = encode(&fields, Strategy::FullVTable, &[1, 2, 3]);
        let decoder = Decoder::default();
        assert_eq!(&*decoder.read_hot_field(&buf, 2, 0).unwrap(), b"two");
        assert_eq!(&*decoder.read_hot_field(&buf, 3, 0).unwrap(), b"three");
    }

    #[test]
    fn hot_read_sparse_tags() {
        // Tag 7 sits in slot 2, neither `tag - 1` nor its rank among hot tags.
        let fields = [
            Field::array(2, b"x"),
            Field::array(4, b"y"),
            Field::array(7, b"target"),
        ];
        let buf = encode(&fields, Strategy::FullVTable, &[7]);
        assert_eq!(&*Decoder::default().read_hot_field(&buf, 7, 0).unwrap(), b"target");

        // In a hot-only vtable the rank lookup hits directly.
        let buf = encode(&fields, Strategy::HotVTable, &[4, 7]);
        assert_eq!(&*Decoder::default().read_hot_field(&buf, 7, 0).unwrap(), b"target");
    }

    #[test]
    fn hot_read_fixed_width() {
        let amount = 42u64.to_le_bytes();
        let fields = [Field::fixed(1, &amount)];
        let buf = encode(&fields, Strategy::FullVTable, &[1]);
        let decoder = Decoder::default();
        assert_eq!(&*decoder.read_hot_field(&buf, 1, 8).unwrap(), &amount);
        assert!(matches!(
            decoder.read_hot_field(&buf, 1, 0),
            Err(DbflatError::UnknownFieldWidth { tag: 1 })
        ));
        assert_eq!(&*widths(&[(1, 8)]).read_hot_field(&buf, 1, 0).unwrap(), &amount);
    }

    #[test]
    fn hot_read_errors() {
        let fields = [Field::array(1, b"one"), Field::array(2, b"two")];
        let buf = encode(&fields, Strategy::FullVTable, &[1]);
        let decoder = Decoder::default();
        assert!(matches!(
            decoder.read_hot_field(&buf, 0, 0),
            Err(DbflatError::InvalidHotTag { tag: 0 })
        ));
        assert!(matches!(
            decoder.read_hot_field(&buf, 9, 0),
            Err(DbflatError::InvalidHotTag { tag: 9 })
        ));
        assert!(matches!(
            decoder.read_hot_field(&buf, 2, 0),
            Err(DbflatError::NotHot { tag: 2 })
        ));
    }

    #[test]
    fn hot_bit_without_slot_is_missing() {
        let fields = [Field::array(1, b"one")];
        let mut buf = encode(&fields, Strategy::FullVTable, &[1]);
        // Advertise tag 3 as hot; no slot carries it.
        buf[8] |= 0b100;
        assert!(matches!(
            Decoder::default().read_hot_field(&buf, 3, 0),
            Err(DbflatError::MissingSlot { tag: 3 })
        ));
    }

    #[test]
    fn every_truncation_fails_cleanly() {
        let amount = 7u32.to_le_bytes();
        let fields = [
            Field::array(1, b"alpha"),
            Field::fixed(2, &amount),
            Field::array(9, b"cold tail"),
        ];
        let decoder = widths(&[(2, 4)]);
        for strategy in [Strategy::FullVTable, Strategy::HotVTable] {
            let buf = encode(&fields, strategy, &[1]);
            for cut in 0..buf.len() {
                assert!(
                    decoder.decode_record(&buf[..cut]).is_err(),
                    "{strategy} cut at {cut}"
                );
            }
        }
    }

    #[test]
    fn tag_walk_errors_on_truncated_tuple() {
        let fields = [Field::array(1, b"alpha"), Field::array(2, b"beta")];
        let buf = encode(&fields, Strategy::TagWalk, &[]);
        let decoder = Decoder::default();
        let (_, next) = decoder.decode_tag_walk(&buf, 0).unwrap().unwrap();
        for cut in next + 1..buf.len() {
            assert!(decoder.decode_tag_walk(&buf[..cut], next).is_err(), "cut {cut}");
        }
        assert!(decoder.decode_tag_walk(&buf, buf.len() + 1).is_err());
    }

    #[test]
    fn find_with_tag_scans_stream() {
        let fields = [
            Field::array(5, b"five"),
            Field::new(1, CompFlags::array(COMP_RLE), b"oooooone"),
            Field::array(3, b"three"),
        ];
        let buf = encode(&fields, Strategy::TagWalk, &[]);
        let decoder = Decoder::default();
        assert_eq!(decoder.find_with_tag(&buf, 3).unwrap().as_deref(), Some(&b"three"[..]));
        assert_eq!(
            decoder.find_with_tag(&buf, 1).unwrap().as_deref(),
            Some(&b"oooooone"[..])
        );
        assert!(decoder.find_with_tag(&buf, 4).unwrap().is_none());
        assert!(decoder.find_with_tag(&[], 4).unwrap().is_none());
    }

    #[test]
    fn duplicate_tags_in_stream_are_rejected() {
        let mut buf = encode(&[Field::array(1, b"a")], Strategy::TagWalk, &[]);
        buf.extend_from_within(..);
        assert!(matches!(
            Decoder::default().decode_tag_walk_all(&buf),
            Err(DbflatError::DuplicateTag { tag: 1 })
        ));
    }

    #[test]
    fn concatenated_records_decode_independently() {
        let first = encode(&[Field::array(1, b"first")], Strategy::FullVTable, &[1]);
        let second = encode(&[Field::array(1, b"second")], Strategy::FullVTable, &[1]);
        let mut buf = first.clone();
        buf.extend_from_slice(&second);

        let decoder = Decoder::default();
        let (_, end) = decoder.header(&buf).unwrap();
        assert_eq!(end, first.len());
        assert_eq!(decoder.decode_record(&buf).unwrap().payload(1), Some(&b"first"[..]));
        assert_eq!(&*decoder.read_hot_field(&buf[end..], 1, 0).unwrap(), b"second");
    }

    #[test]
    fn decode_into_reuses_arena() {
        let a = encode(&[Field::array(1, b"a"), Field::array(2, b"b")], Strategy::FullVTable, &[]);
        let decoder = Decoder::default();
        let mut record = DecodedRecord::new();
        decoder.decode_record_into(&a, &mut record).unwrap();
        assert_eq!(record.len(), 2);

        let b = encode(&[Field::array(3, b"c")], Strategy::FullVTable, &[]);
        let mut record = record.recycle();
        decoder.decode_record_into(&b, &mut record).unwrap();
        assert_eq!(record.len(), 1);

        assert!(decoder.decode_record_into(&b[..10], &mut record).is_err());
        assert!(record.is_empty());
    }

    #[test]
    fn encoder_width_registry_matches_decoder() {
        let widths_map: HashMap<u16, usize> = [(2, 2)].into_iter().collect();
        let shared: SharedWidths = Arc::new(widths_map);
        let encoder = Encoder::new(EncoderConfig::new().validate_widths(shared.clone()));
        let value = 513u16.to_le_bytes();
        let fields = [Field::fixed(2, &value)];
        let buf = encoder.encode_to_vec(&LayoutPlan::new(&fields[..])).unwrap();
        let record = Decoder::with_widths(shared).decode_record(&buf).unwrap();
        assert_eq!(record.payload(2), Some(&value[..]));
    }
}
