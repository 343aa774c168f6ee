//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding primitives and blobs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A varint ran off the end of the input or exceeded 64 bits.
    #[error("truncated or overlong varint")]
    TruncatedVarint,

    /// Fewer bytes were available than a fixed-width read needs.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Bytes required by the read.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A declared field type has no defined wire representation.
    #[error("unsupported field type: {type_name}")]
    UnsupportedFieldType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// No compressor is registered under this id.
    #[error("unsupported compressor id {id}")]
    UnknownCompressor {
        /// The 4-bit compressor id.
        id: u8,
    },

    /// The raw codec slot cannot be replaced or removed.
    #[error("compressor id {id} is reserved")]
    ReservedCompressor {
        /// The reserved id.
        id: u8,
    },

    /// A compressor failed to encode its input.
    #[error("{codec} compression failed: {message}")]
    CompressionFailed {
        /// Name of the compressor.
        codec: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// A compressed blob could not be decoded.
    #[error("{codec} decompression failed: {message}")]
    DecompressionFailed {
        /// Name of the compressor.
        codec: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Decompressed output would exceed the compressor's ceiling.
    #[error("{codec} output exceeds {limit} bytes")]
    OutputTooLarge {
        /// Name of the compressor.
        codec: &'static str,
        /// Largest output the compressor accepts.
        limit: usize,
    },

    /// Decompressed output did not have the expected size.
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Size the caller expected.
        expected: usize,
        /// Size actually produced.
        actual: usize,
    },
}

impl CodecError {
    /// Create an unsupported field type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedFieldType {
            type_name: type_name.into(),
        }
    }

    /// Create a compression failed error.
    pub fn compression_failed(codec: &'static str, message: impl Into<String>) -> Self {
        Self::CompressionFailed {
            codec,
            message: message.into(),
        }
    }

    /// Create a decompression failed error.
    pub fn decompression_failed(codec: &'static str, message: impl Into<String>) -> Self {
        Self::DecompressionFailed {
            codec,
            message: message.into(),
        }
    }
}
