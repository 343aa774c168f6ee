//! Read-only query view over one buffer.
//!
//! An [`Inspector`] answers point lookups by tag and walks the tag-walk
//! part of a buffer with a resumable cursor: the whole stream for
//! header-less buffers, the cold section for records.

use crate::decoder::Decoder;
use crate::error::DbflatResult;
use crate::field::DecodedField;
use crate::header::{Header, Layout};
use crate::tagwalk::{CursorState, TagWalkCursor};
use std::borrow::Cow;
use std::ops::Range;
use tracing::trace;

/// Point lookups and a tag-walk cursor over one buffer.
#[derive(Debug, Clone)]
pub struct Inspector<'a> {
    decoder: Decoder,
    buf: &'a [u8],
    layout: Layout,
    header: Option<Header>,
    section: Range<usize>,
    cursor: TagWalkCursor,
}

impl<'a> Inspector<'a> {
    /// An inspector over an empty buffer.
    #[must_use]
    pub fn new(decoder: Decoder) -> Self {
        Self {
            decoder,
            buf: &[],
            layout: Layout::TagWalk,
            header: None,
            section: 0..0,
            cursor: TagWalkCursor::new(0),
        }
    }

    /// An inspector over `buf`.
    ///
    /// # Errors
    ///
    /// As [`Inspector::insert`].
    pub fn with_buffer(decoder: Decoder, buf: &'a [u8]) -> DbflatResult<Self> {
        let mut inspector = Self::new(decoder);
        inspector.insert(buf)?;
        Ok(inspector)
    }

    /// Point at a new buffer and reset the cursor.
    ///
    /// # Errors
    ///
    /// Returns a header error if `buf` starts with the record magic but its
    /// header is invalid. The inspector is left empty in that case.
    pub fn insert(&mut self, buf: &'a [u8]) -> DbflatResult<()> {
        self.buf = &[];
        self.layout = Layout::TagWalk;
        self.header = None;
        self.section = 0..0;
        self.cursor.reset(0);

        let layout = Layout::detect(buf);
        let (header, section) = match layout {
            Layout::Record => {
                let (header, end) = self.decoder.header(buf)?;
                let start = if header.has_cold_section() {
                    header.cold_offset as usize
                } else {
                    end
                };
                (Some(header), start..end)
            }
            Layout::TagWalk => (None, 0..buf.len()),
        };
        self.buf = buf;
        self.layout = layout;
        self.header = header;
        self.cursor.reset(section.start);
        self.section = section;
        Ok(())
    }

    /// Move to a new buffer with a different lifetime.
    ///
    /// # Errors
    ///
    /// As [`Inspector::insert`].
    pub fn rebind<'b>(self, buf: &'b [u8]) -> DbflatResult<Inspector<'b>> {
        Inspector::with_buffer(self.decoder, buf)
    }

    /// The inspected buffer.
    #[must_use]
    pub const fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Layout of the inspected buffer.
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Header of the inspected record, if it has one.
    #[must_use]
    pub const fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// The decoder used for lookups.
    #[must_use]
    pub const fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Payload of `tag`, or `None` when the buffer has no such field.
    ///
    /// # Errors
    ///
    /// Returns bounds, width or compressor errors met while scanning.
    pub fn get_field(&self, tag: u16) -> DbflatResult<Option<Cow<'a, [u8]>>> {
        match self.layout {
            Layout::TagWalk => self.decoder.find_with_tag(self.buf, tag),
            Layout::Record => self.decoder.lookup_field(self.buf, tag),
        }
    }

    /// Restart the cursor at the beginning of the tag-walk section.
    pub fn scan(&mut self) {
        self.cursor.reset(self.section.start);
    }

    /// Cursor state.
    #[must_use]
    pub const fn cursor_state(&self) -> CursorState {
        self.cursor.state()
    }

    /// Read the tuple under the cursor and advance past it.
    ///
    /// Returns `Ok(None)` at the end of the section. Any error exhausts the
    /// cursor until the next [`Inspector::scan`] or [`Inspector::insert`].
    ///
    /// # Errors
    ///
    /// As [`Decoder::decode_tag_walk`].
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> DbflatResult<Option<DecodedField<'a>>> {
        let Some(pos) = self.cursor.position() else {
            return Ok(None);
        };
        match self.decoder.read_tuple(self.buf, pos, self.section.end) {
            Ok(Some((field, next))) => {
                self.cursor.advance(next);
                Ok(Some(field))
            }
            Ok(None) => {
                trace!(offset = pos, "cursor exhausted");
                self.cursor.exhaust();
                Ok(None)
            }
            Err(err) => {
                self.cursor.exhaust();
                Err(err)
            }
        }
    }

    /// Read the tuple under the cursor without moving it.
    ///
    /// # Errors
    ///
    /// As [`Decoder::decode_tag_walk`].
    pub fn peek(&self) -> DbflatResult<Option<DecodedField<'a>>> {
        let Some(pos) = self.cursor.position() else {
            return Ok(None);
        };
        Ok(self
            .decoder
            .read_tuple(self.buf, pos, self.section.end)?
            .map(|(field, _)| field))
    }
}

impl Default for Inspector<'_> {
    fn default() -> Self {
        Self::new(Decoder::default())
    }
}
