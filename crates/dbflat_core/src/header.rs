//! Record header.
//!
//! ```text
//! offset  size  field
//! 0       4     magic        0x44424633 LE
//! 4       2     version      BE
//! 6       2     flags        LE
//! 8       8     schema_id    LE, only when flags bit1 is set
//! +0      1     hot_bitmap   bit (t-1) marks hot tag t
//! +1      1     vtable_slots
//! +2      2     data_offset  LE, absolute
//! +4      4     vtable_off   LE, absolute
//! +8      4     record_len   LE, header included
//! +12     4     cold_offset  LE, 0 when there is no cold section
//! +16     8     zero
//! ```
//!
//! The header is 40 bytes with a schema id and 32 without.

use crate::error::{DbflatError, DbflatResult};
use crate::vtable::SLOT_SIZE;
use std::ops::{BitOr, BitOrAssign, Range};

/// Header magic, "DBF3".
pub const MAGIC: u32 = 0x4442_4633;
/// Format version written by this crate.
pub const VERSION: u16 = 1;
/// Header size when a schema id is present.
pub const HEADER_SIZE: usize = 40;
/// Header size without a schema id.
pub const HEADER_SIZE_NO_SCHEMA: usize = 32;
/// Highest tag that can be hot.
pub const MAX_HOT_TAG: u16 = 8;
/// Most vtable slots a header can describe.
pub const MAX_VTABLE_SLOTS: usize = u8::MAX as usize;

const RESERVED_SIZE: usize = 16;

/// Header flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HeaderFlags(u16);

impl HeaderFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Field payloads start on 8-byte boundaries.
    pub const ALIGN8: Self = Self(0x0001);
    /// An 8-byte schema id follows the flags.
    pub const SCHEMA_ID: Self = Self(0x0002);
    /// Reserved for an index section; never set by this encoder.
    pub const INDEX: Self = Self(0x0004);

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

    /// Whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `self` without the bits of `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether payloads are 8-byte aligned.
    #[must_use]
    pub const fn is_aligned(self) -> bool {
        self.contains(Self::ALIGN8)
    }

    /// Whether a schema id is present.
    #[must_use]
    pub const fn has_schema_id(self) -> bool {
        self.contains(Self::SCHEMA_ID)
    }
}

impl BitOr for HeaderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for HeaderFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// Set of hot tags, one bit per tag in `1..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HotBitmap(u8);

impl HotBitmap {
    /// Nothing hot.
    pub const EMPTY: Self = Self(0);

    /// Wrap a raw bitmap.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw bitmap.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether `tag` can be hot at all.
    #[must_use]
    pub const fn in_range(tag: u16) -> bool {
        tag >= 1 && tag <= MAX_HOT_TAG
    }

    /// Mark `tag` hot. Out-of-range tags are ignored; returns whether the
    /// tag was accepted.
    pub fn insert(&mut self, tag: u16) -> bool {
        if !Self::in_range(tag) {
            return false;
        }
        self.0 |= 1 << (tag - 1);
        true
    }

    /// Whether `tag` is marked hot.
    #[must_use]
    pub const fn contains(self, tag: u16) -> bool {
        Self::in_range(tag) && self.0 & (1 << (tag - 1)) != 0
    }

    /// Number of hot tags below `tag`.
    #[must_use]
    pub const fn rank(self, tag: u16) -> usize {
        if tag <= 1 {
            return 0;
        }
        let below = if tag > MAX_HOT_TAG {
            0xFF
        } else {
            (1u16 << (tag - 1)) as u8 - 1
        };
        (self.0 & below).count_ones() as usize
    }

    /// Number of hot tags.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether no tag is hot.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Hot tags in ascending order.
    pub fn tags(self) -> impl Iterator<Item = u16> {
        (1..=MAX_HOT_TAG).filter(move |&tag| self.contains(tag))
    }
}

impl FromIterator<u16> for HotBitmap {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut bitmap = Self::EMPTY;
        for tag in iter {
            bitmap.insert(tag);
        }
        bitmap
    }
}

/// Which layout a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Header, vtable, data and an optional cold section.
    Record,
    /// A bare stream of tag-walk tuples.
    TagWalk,
}

impl Layout {
    /// Classify `buf` by its first four bytes.
    ///
    /// A tag-walk stream can never start with the magic because the
    /// magic's upper half would be a `comp_flags` word with reserved bits
    /// set.
    #[must_use]
    pub fn detect(buf: &[u8]) -> Self {
        match buf.get(..4) {
            Some(word) if u32::from_le_bytes([word[0], word[1], word[2], word[3]]) == MAGIC => {
                Self::Record
            }
            _ => Self::TagWalk,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::TagWalk => "tagwalk",
        }
    }
}

/// A parsed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version.
    pub version: u16,
    /// Header flags. The schema-id bit mirrors `schema_id`.
    pub flags: HeaderFlags,
    /// Schema identifier, when present.
    pub schema_id: Option<u64>,
    /// Hot tags.
    pub hot_bitmap: HotBitmap,
    /// Number of vtable slots.
    pub vtable_slots: u8,
    /// Absolute offset of the data region.
    pub data_offset: u16,
    /// Absolute offset of the vtable.
    pub vtable_off: u32,
    /// Total record length, or 0 when unknown.
    pub record_len: u32,
    /// Absolute offset of the cold section, or 0.
    pub cold_offset: u32,
}

impl Header {
    /// Header size for the given flags.
    #[must_use]
    pub const fn size_for(flags: HeaderFlags) -> usize {
        if flags.has_schema_id() {
            HEADER_SIZE
        } else {
            HEADER_SIZE_NO_SCHEMA
        }
    }

    /// Size of this header in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        Self::size_for(self.flags)
    }

    /// Whether the record has a tag-walk cold section.
    #[must_use]
    pub const fn has_cold_section(&self) -> bool {
        self.cold_offset != 0
    }

    /// Byte range of the vtable.
    #[must_use]
    pub fn vtable_range(&self) -> Range<usize> {
        let start = self.vtable_off as usize;
        start..start + usize::from(self.vtable_slots) * SLOT_SIZE
    }

    /// End of the data region: the cold section start or the record end.
    #[must_use]
    pub fn data_end(&self, record_end: usize) -> usize {
        if self.has_cold_section() {
            self.cold_offset as usize
        } else {
            record_end
        }
    }

    /// Validate this header against a buffer of `buf_len` bytes and return
    /// the record end.
    ///
    /// A zero `record_len` means the record extends to the end of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::OutOfBounds`] if the buffer is shorter than the
    /// record, or [`DbflatError::MalformedHeader`] if the offsets disagree.
    pub fn record_end(&self, buf_len: usize) -> DbflatResult<usize> {
        let end = if self.record_len == 0 {
            buf_len
        } else {
            self.record_len as usize
        };
        if end > buf_len {
            return Err(DbflatError::out_of_bounds("record", end, buf_len));
        }
        let vtable = self.vtable_range();
        let data_offset = usize::from(self.data_offset);
        if vtable.start < self.size() || vtable.end > data_offset {
            return Err(DbflatError::malformed("vtable overlaps header or data"));
        }
        if data_offset > end {
            return Err(DbflatError::out_of_bounds("data", data_offset, end));
        }
        if self.has_cold_section() {
            let cold = self.cold_offset as usize;
            if cold < data_offset || cold > end {
                return Err(DbflatError::malformed("cold section outside record"));
            }
        }
        Ok(end)
    }

    /// Append the encoded header to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let flags = match self.schema_id {
            Some(_) => self.flags | HeaderFlags::SCHEMA_ID,
            None => self.flags.difference(HeaderFlags::SCHEMA_ID),
        };
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&flags.bits().to_le_bytes());
        if let Some(id) = self.schema_id {
            out.extend_from_slice(&id.to_le_bytes());
        }
        out.push(self.hot_bitmap.bits());
        out.push(self.vtable_slots);
        out.extend_from_slice(&self.data_offset.to_le_bytes());
        out.extend_from_slice(&self.vtable_off.to_le_bytes());
        out.extend_from_slice(&self.record_len.to_le_bytes());
        out.extend_from_slice(&self.cold_offset.to_le_bytes());
        out.extend_from_slice(&[0u8; RESERVED_SIZE - 8]);
    }

    /// Parse the header at the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::MalformedHeader`] if `buf` is too short, the
    /// magic is wrong, or the version is unsupported.
    pub fn parse(buf: &[u8]) -> DbflatResult<Self> {
        if buf.len() < HEADER_SIZE_NO_SCHEMA {
            return Err(DbflatError::malformed("buffer shorter than header"));
        }
        if Layout::detect(buf) != Layout::Record {
            return Err(DbflatError::malformed("bad magic"));
        }
        let version = u16::from_be_bytes([buf[4], buf[5]]);
        if version != VERSION {
            return Err(DbflatError::malformed("unsupported version"));
        }
        let flags = HeaderFlags::from_bits(u16::from_le_bytes([buf[6], buf[7]]));

        let (schema_id, pos) = if flags.has_schema_id() {
            if buf.len() < HEADER_SIZE {
                return Err(DbflatError::malformed("buffer shorter than header"));
            }
            (Some(le_u64(&buf[8..16])), 16)
        } else {
            (None, 8)
        };

        let fixed = &buf[pos..pos + 16];
        Ok(Self {
            version,
            flags,
            schema_id,
            hot_bitmap: HotBitmap::from_bits(fixed[0]),
            vtable_slots: fixed[1],
            data_offset: u16::from_le_bytes([fixed[2], fixed[3]]),
            vtable_off: le_u32(&fixed[4..8]),
            record_len: le_u32(&fixed[8..12]),
            cold_offset: le_u32(&fixed[12..16]),
        })
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}
