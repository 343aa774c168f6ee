//! Vtable slots.
//!
//! Each slot is `tag u16 | comp_flags u16 | offset u32`, little-endian,
//! with `offset` relative to the header's `data_offset`. Slots are written
//! in ascending tag order.

use crate::error::{DbflatError, DbflatResult};
use crate::field::CompFlags;
use crate::header::Header;

/// Encoded size of one slot.
pub const SLOT_SIZE: usize = 8;

/// One vtable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VTableSlot {
    /// Field tag.
    pub tag: u16,
    /// Field flags.
    pub comp_flags: CompFlags,
    /// Payload offset relative to the data region.
    pub offset: u32,
}

impl VTableSlot {
    /// Append the encoded slot to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tag.to_le_bytes());
        out.extend_from_slice(&self.comp_flags.bits().to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
    }

    fn decode(raw: &[u8]) -> Self {
        Self {
            tag: u16::from_le_bytes([raw[0], raw[1]]),
            comp_flags: CompFlags::from_bits(u16::from_le_bytes([raw[2], raw[3]])),
            offset: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        }
    }
}

/// A bounds-checked view of a record's vtable.
#[derive(Debug, Clone, Copy)]
pub struct VTable<'a> {
    bytes: &'a [u8],
}

impl<'a> VTable<'a> {
    /// View the vtable described by `header` inside `record`.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::OutOfBounds`] if the slots run past `record`.
    pub fn new(record: &'a [u8], header: &Header) -> DbflatResult<Self> {
        let range = header.vtable_range();
        let bytes = record
            .get(range.clone())
            .ok_or_else(|| DbflatError::out_of_bounds("vtable", range.end, record.len()))?;
        Ok(Self { bytes })
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / SLOT_SIZE
    }

    /// Whether the vtable is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Slot at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<VTableSlot> {
        let start = index.checked_mul(SLOT_SIZE)?;
        self.bytes
            .get(start..start + SLOT_SIZE)
            .map(VTableSlot::decode)
    }

    /// Binary search for `tag`, returning the slot index and slot.
    #[must_use]
    pub fn find(&self, tag: u16) -> Option<(usize, VTableSlot)> {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let slot = self.get(mid)?;
            match slot.tag.cmp(&tag) {
                std::cmp::Ordering::Equal => return Some((mid, slot)),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    /// Slots in stored order.
    pub fn iter(&self) -> impl Iterator<Item = VTableSlot> + 'a {
        self.bytes.chunks_exact(SLOT_SIZE).map(VTableSlot::decode)
    }
}
