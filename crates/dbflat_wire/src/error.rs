//! Error types for frame encoding and decoding.

use dbflat_codec::CodecError;
use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while framing or unframing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The first two bytes are not the frame magic.
    #[error("invalid frame magic {found:#06x}")]
    BadMagic {
        /// The value found.
        found: u16,
    },

    /// The frame type byte is not one of the known types.
    #[error("unknown frame type {code}")]
    UnknownFrameType {
        /// The type byte.
        code: u8,
    },

    /// The buffer ends before the frame does.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the frame needs.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The declared total length cannot describe a frame.
    #[error("invalid frame length {declared}")]
    LengthMismatch {
        /// The length field as read.
        declared: u32,
    },

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum carried by the frame.
        stored: u32,
        /// Checksum of the received bytes.
        computed: u32,
    },

    /// The payload does not match the layout its frame type requires.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// What was wrong.
        reason: &'static str,
    },

    /// A frame was asked for a payload of another type.
    #[error("expected {expected:?} frame, got {actual:?}")]
    WrongFrameType {
        /// Type the caller asked for.
        expected: crate::frame::FrameType,
        /// Type of the frame.
        actual: crate::frame::FrameType,
    },

    /// The encoded frame would not fit the 32-bit length field.
    #[error("frame of {size} bytes exceeds the length field")]
    FrameTooLarge {
        /// Size the frame would have had.
        size: usize,
    },

    /// Varint or other codec failure inside a payload.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl WireError {
    /// Create a malformed payload error.
    pub const fn malformed(reason: &'static str) -> Self {
        Self::MalformedPayload { reason }
    }

    /// Create a truncation error.
    pub const fn truncated(needed: usize, available: usize) -> Self {
        Self::Truncated { needed, available }
    }
}
