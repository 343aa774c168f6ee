//! Field tuples and per-field framing.
//!
//! A field is `(tag, comp_flags, payload)`. How the payload is framed on
//! the wire depends only on its `comp_flags`:
//!
//! - array bit set, or a non-raw compressor: `varint(stored_len) | stored`
//! - otherwise: the raw payload, whose width comes from a width registry

use crate::error::{DbflatError, DbflatResult};
use dbflat_codec::{read_varuint, write_varuint, CompressorRegistry, COMP_RAW};
use std::borrow::Cow;
use std::fmt;

/// Array (variable-length) bit of `comp_flags`.
pub const ARRAY_BIT: u16 = 0x8000;
/// Compressor id bits of `comp_flags`.
pub const COMPRESSOR_MASK: u16 = 0x000F;
/// Bits that must be zero.
pub const RESERVED_MASK: u16 = !(ARRAY_BIT | COMPRESSOR_MASK);

/// The 16-bit per-field flags word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompFlags(u16);

impl CompFlags {
    /// Fixed-width, uncompressed.
    pub const RAW: Self = Self(0);
    /// Variable-length, uncompressed.
    pub const ARRAY: Self = Self(ARRAY_BIT);

    /// Wrap a raw flags word.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// The raw flags word.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Variable-length flags using compressor `id`.
    #[must_use]
    pub const fn array(id: u8) -> Self {
        Self(ARRAY_BIT | (id as u16 & COMPRESSOR_MASK))
    }

    /// Same flags with the compressor replaced.
    #[must_use]
    pub const fn with_compressor(self, id: u8) -> Self {
        Self((self.0 & !COMPRESSOR_MASK) | (id as u16 & COMPRESSOR_MASK))
    }

    /// Whether the array bit is set.
    #[must_use]
    pub const fn is_array(self) -> bool {
        self.0 & ARRAY_BIT != 0
    }

    /// The 4-bit compressor id.
    #[must_use]
    pub const fn compressor(self) -> u8 {
        (self.0 & COMPRESSOR_MASK) as u8
    }

    /// Whether the payload goes through a non-raw compressor.
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        self.compressor() != COMP_RAW
    }

    /// Whether the stored payload carries a varint length prefix.
    #[must_use]
    pub const fn is_length_prefixed(self) -> bool {
        self.is_array() || self.is_compressed()
    }

    /// Whether any reserved bit is set.
    #[must_use]
    pub const fn has_reserved_bits(self) -> bool {
        self.0 & RESERVED_MASK != 0
    }

    /// Reject flags with reserved bits set.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::InvalidCompFlags`] naming `tag`.
    pub fn validate(self, tag: u16) -> DbflatResult<()> {
        if self.has_reserved_bits() {
            return Err(DbflatError::InvalidCompFlags {
                tag,
                comp_flags: self.0,
            });
        }
        Ok(())
    }
}

impl From<u16> for CompFlags {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}

impl From<CompFlags> for u16 {
    fn from(flags: CompFlags) -> Self {
        flags.0
    }
}

impl fmt::Debug for CompFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompFlags({:#06x})", self.0)
    }
}

/// A borrowed field tuple, the encoder's unit of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    /// Field identifier.
    pub tag: u16,
    /// Per-field flags.
    pub comp_flags: CompFlags,
    /// Raw (uncompressed) payload.
    pub payload: &'a [u8],
}

impl<'a> Field<'a> {
    /// Create a field.
    #[must_use]
    pub const fn new(tag: u16, comp_flags: CompFlags, payload: &'a [u8]) -> Self {
        Self {
            tag,
            comp_flags,
            payload,
        }
    }

    /// A fixed-width, uncompressed field.
    #[must_use]
    pub const fn fixed(tag: u16, payload: &'a [u8]) -> Self {
        Self::new(tag, CompFlags::RAW, payload)
    }

    /// A variable-length, uncompressed field.
    #[must_use]
    pub const fn array(tag: u16, payload: &'a [u8]) -> Self {
        Self::new(tag, CompFlags::ARRAY, payload)
    }
}

/// An owned field tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBuf {
    /// Field identifier.
    pub tag: u16,
    /// Per-field flags.
    pub comp_flags: CompFlags,
    /// Raw (uncompressed) payload.
    pub payload: Vec<u8>,
}

impl FieldBuf {
    /// Create an owned field.
    pub fn new(tag: u16, comp_flags: CompFlags, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            comp_flags,
            payload: payload.into(),
        }
    }

    /// Borrow as a [`Field`].
    #[must_use]
    pub fn as_field(&self) -> Field<'_> {
        Field::new(self.tag, self.comp_flags, &self.payload)
    }
}

impl From<Field<'_>> for FieldBuf {
    fn from(field: Field<'_>) -> Self {
        Self::new(field.tag, field.comp_flags, field.payload)
    }
}

/// An indexed collection of fields the encoder can read.
pub trait FieldSource {
    /// Number of fields.
    fn field_count(&self) -> usize;

    /// Field at `index`, `index < field_count()`.
    fn field(&self, index: usize) -> Field<'_>;
}

impl FieldSource for [Field<'_>] {
    fn field_count(&self) -> usize {
        self.len()
    }

    fn field(&self, index: usize) -> Field<'_> {
        self[index]
    }
}

impl FieldSource for Vec<Field<'_>> {
    fn field_count(&self) -> usize {
        self.len()
    }

    fn field(&self, index: usize) -> Field<'_> {
        self[index]
    }
}

impl FieldSource for [FieldBuf] {
    fn field_count(&self) -> usize {
        self.len()
    }

    fn field(&self, index: usize) -> Field<'_> {
        self[index].as_field()
    }
}

impl FieldSource for Vec<FieldBuf> {
    fn field_count(&self) -> usize {
        self.len()
    }

    fn field(&self, index: usize) -> Field<'_> {
        self[index].as_field()
    }
}

/// A decoded field. Raw payloads borrow the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedField<'a> {
    /// Field identifier.
    pub tag: u16,
    /// Per-field flags as stored.
    pub comp_flags: CompFlags,
    /// Decompressed payload.
    pub payload: Cow<'a, [u8]>,
}

impl DecodedField<'_> {
    /// Detach from the input buffer.
    #[must_use]
    pub fn into_owned(self) -> FieldBuf {
        FieldBuf::new(self.tag, self.comp_flags, self.payload.into_owned())
    }
}

/// Append the framed body of one field to `out`.
///
/// `staging` is scratch for compressed output and is left in an
/// unspecified state.
pub(crate) fn write_body(
    out: &mut Vec<u8>,
    field: Field<'_>,
    compressors: &CompressorRegistry,
    staging: &mut Vec<u8>,
) -> DbflatResult<()> {
    let flags = field.comp_flags;
    if flags.is_compressed() {
        staging.clear();
        compressors.compress_into(flags.compressor(), field.payload, staging)?;
        write_varuint(out, staging.len() as u64);
        out.extend_from_slice(staging);
    } else if flags.is_array() {
        write_varuint(out, field.payload.len() as u64);
        out.extend_from_slice(field.payload);
    } else {
        out.extend_from_slice(field.payload);
    }
    Ok(())
}

/// Locate the stored bytes of a field body starting at `ptr`.
///
/// Reads never go past `limit`. `width` is required for fixed-width
/// bodies. Returns the stored slice and the offset just past it.
pub(crate) fn read_body(
    buf: &[u8],
    ptr: usize,
    limit: usize,
    tag: u16,
    flags: CompFlags,
    width: Option<usize>,
) -> DbflatResult<(&[u8], usize)> {
    if ptr > limit || limit > buf.len() {
        return Err(DbflatError::out_of_bounds("field", ptr, limit.min(buf.len())));
    }
    let (start, len) = if flags.is_length_prefixed() {
        let (len, used) = read_varuint(&buf[ptr..limit]);
        if used == 0 {
            return Err(DbflatError::TruncatedVarint);
        }
        let len = usize::try_from(len)
            .map_err(|_| DbflatError::out_of_bounds("field", usize::MAX, limit))?;
        (ptr + used, len)
    } else {
        let width = width.ok_or(DbflatError::UnknownFieldWidth { tag })?;
        (ptr, width)
    };
    let end = start
        .checked_add(len)
        .filter(|&end| end <= limit)
        .ok_or_else(|| DbflatError::out_of_bounds("field", start.saturating_add(len), limit))?;
    Ok((&buf[start..end], end))
}

/// Turn stored bytes into the caller-visible payload.
pub(crate) fn materialize<'a>(
    stored: &'a [u8],
    flags: CompFlags,
    compressors: &CompressorRegistry,
) -> DbflatResult<Cow<'a, [u8]>> {
    if !flags.is_compressed() {
        return Ok(Cow::Borrowed(stored));
    }
    let mut raw = Vec::with_capacity(stored.len() * 2);
    compressors.decompress_into(flags.compressor(), stored, None, &mut raw)?;
    Ok(Cow::Owned(raw))
}
