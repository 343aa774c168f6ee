//! Error types for the record layout engine.

use dbflat_codec::CodecError;
use std::io;
use thiserror::Error;

/// Result type for record operations.
pub type DbflatResult<T> = Result<T, DbflatError>;

/// Errors that can occur while encoding, decoding or inspecting records.
#[derive(Debug, Error)]
pub enum DbflatError {
    /// The buffer does not start with a valid record header.
    #[error("malformed header: {reason}")]
    MalformedHeader {
        /// What was wrong with the header.
        reason: &'static str,
    },

    /// A read would run past the end of its region.
    #[error("{region} out of bounds: needs {end} bytes, {available} available")]
    OutOfBounds {
        /// The region being read.
        region: &'static str,
        /// End offset the read required.
        end: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A field names a compressor id with no registered codec.
    #[error("unsupported compressor id {id}")]
    UnknownCompressor {
        /// The 4-bit compressor id.
        id: u8,
    },

    /// A hot lookup asked for a tag outside `1..=8`.
    #[error("tag {tag} is outside the hot range 1..=8")]
    InvalidHotTag {
        /// The requested tag.
        tag: u16,
    },

    /// The hot bitmap does not contain the requested tag.
    #[error("tag {tag} is not marked hot in this record")]
    NotHot {
        /// The requested tag.
        tag: u16,
    },

    /// A length prefix ran off the end of the input or exceeded 64 bits.
    #[error("truncated or overlong varint")]
    TruncatedVarint,

    /// A declared field type has no wire representation.
    #[error("unsupported field type: {type_name}")]
    UnsupportedFieldType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// The same tag appears more than once in one record.
    #[error("duplicate tag {tag}")]
    DuplicateTag {
        /// The repeated tag.
        tag: u16,
    },

    /// Reserved `comp_flags` bits are set.
    #[error("invalid comp_flags {comp_flags:#06x} on tag {tag}")]
    InvalidCompFlags {
        /// Tag carrying the flags.
        tag: u16,
        /// The offending flags.
        comp_flags: u16,
    },

    /// A fixed-width field has no known width, so it cannot be stepped over.
    #[error("no known width for fixed-width tag {tag}")]
    UnknownFieldWidth {
        /// The tag without a width.
        tag: u16,
    },

    /// A fixed-width payload disagrees with the registered width.
    #[error("tag {tag} payload is {actual} bytes, expected {expected}")]
    WidthMismatch {
        /// The field tag.
        tag: u16,
        /// Registered width.
        expected: usize,
        /// Payload length supplied.
        actual: usize,
    },

    /// The record does not fit the header's fixed-size fields.
    #[error("layout overflow: {what}")]
    LayoutOverflow {
        /// Which limit was exceeded.
        what: &'static str,
    },

    /// The hot bitmap advertises a tag no vtable slot carries.
    #[error("hot tag {tag} has no vtable slot")]
    MissingSlot {
        /// The advertised tag.
        tag: u16,
    },

    /// A required field was absent when rebuilding a typed record.
    #[error("missing required field {tag}")]
    MissingField {
        /// The absent tag.
        tag: u16,
    },

    /// A layout strategy name is not recognised.
    #[error("unknown layout strategy {name:?}")]
    UnknownStrategy {
        /// The rejected name.
        name: String,
    },

    /// A schema document is invalid.
    #[error("invalid schema: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// Codec-layer failure.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// I/O error while loading a schema.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON error while loading a schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbflatError {
    /// Create a malformed header error.
    pub const fn malformed(reason: &'static str) -> Self {
        Self::MalformedHeader { reason }
    }

    /// Create an out-of-bounds error.
    pub const fn out_of_bounds(region: &'static str, end: usize, available: usize) -> Self {
        Self::OutOfBounds {
            region,
            end,
            available,
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }
}

impl From<CodecError> for DbflatError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnknownCompressor { id } => Self::UnknownCompressor { id },
            CodecError::TruncatedVarint => Self::TruncatedVarint,
            CodecError::UnsupportedFieldType { type_name } => {
                Self::UnsupportedFieldType { type_name }
            }
            other => Self::Codec(other),
        }
    }
}
