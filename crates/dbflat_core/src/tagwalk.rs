//! Tag-walk tuples and the cursor that steps through them.
//!
//! A tuple is `tag u16 LE | comp_flags u16 LE | body`, where the body is
//! framed as described in [`crate::field`]. Tuples are self-delimiting as
//! long as every fixed-width tag has a known width.

use crate::error::{DbflatError, DbflatResult};
use crate::field::{read_body, write_body, CompFlags, Field};
use crate::schema::FieldWidths;
use dbflat_codec::CompressorRegistry;

/// Bytes before a tuple's body.
pub const TUPLE_HEADER_SIZE: usize = 4;

/// Append one tuple to `out`.
pub(crate) fn write_tuple(
    out: &mut Vec<u8>,
    field: Field<'_>,
    compressors: &CompressorRegistry,
    staging: &mut Vec<u8>,
) -> DbflatResult<()> {
    out.extend_from_slice(&field.tag.to_le_bytes());
    out.extend_from_slice(&field.comp_flags.bits().to_le_bytes());
    write_body(out, field, compressors, staging)
}

/// A tuple located in a buffer, body still in stored form.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawTuple<'a> {
    pub(crate) tag: u16,
    pub(crate) comp_flags: CompFlags,
    pub(crate) stored: &'a [u8],
}

/// Read the tuple at `start`, never looking past `limit`.
///
/// Returns `Ok(None)` when `start == limit`, otherwise the tuple and the
/// offset of the next one.
pub(crate) fn read_raw_tuple<'a>(
    buf: &'a [u8],
    start: usize,
    limit: usize,
    widths: &(dyn FieldWidths + Send + Sync),
) -> DbflatResult<Option<(RawTuple<'a>, usize)>> {
    let limit = limit.min(buf.len());
    if start == limit {
        return Ok(None);
    }
    let head = start
        .checked_add(TUPLE_HEADER_SIZE)
        .filter(|&end| end <= limit)
        .ok_or_else(|| {
            DbflatError::out_of_bounds("tuple", start.saturating_add(TUPLE_HEADER_SIZE), limit)
        })?;
    let tag = u16::from_le_bytes([buf[start], buf[start + 1]]);
    let comp_flags = CompFlags::from_bits(u16::from_le_bytes([buf[start + 2], buf[start + 3]]));
    comp_flags.validate(tag)?;

    let width = if comp_flags.is_length_prefixed() {
        None
    } else {
        Some(
            widths
                .fixed_width(tag)
                .ok_or(DbflatError::UnknownFieldWidth { tag })?,
        )
    };
    let (stored, next) = read_body(buf, head, limit, tag, comp_flags, width)?;
    Ok(Some((
        RawTuple {
            tag,
            comp_flags,
            stored,
        },
        next,
    )))
}

/// Where a [`TagWalkCursor`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Not started; the next read comes from the section start.
    Idle,
    /// At least one tuple read; the next read comes from this offset.
    Positioned(usize),
    /// End of section or an error was reached.
    Exhausted,
}

/// Resumable position in a tag-walk section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagWalkCursor {
    start: usize,
    state: CursorState,
}

impl TagWalkCursor {
    /// A cursor that will start reading at `start`.
    #[must_use]
    pub const fn new(start: usize) -> Self {
        Self {
            start,
            state: CursorState::Idle,
        }
    }

    /// Back to [`CursorState::Idle`] at `start`.
    pub fn reset(&mut self, start: usize) {
        *self = Self::new(start);
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    /// Offset of the next tuple, or `None` once exhausted.
    #[must_use]
    pub const fn position(&self) -> Option<usize> {
        match self.state {
            CursorState::Idle => Some(self.start),
            CursorState::Positioned(offset) => Some(offset),
            CursorState::Exhausted => None,
        }
    }

    /// Record a successful read ending at `next`.
    pub fn advance(&mut self, next: usize) {
        self.state = CursorState::Positioned(next);
    }

    /// Stop; only a reset leaves this state.
    pub fn exhaust(&mut self) {
        self.state = CursorState::Exhausted;
    }
}
