//! # DBFlat Wire
//!
//! CompactWire framing for DBFlat records.
//!
//! A frame is a fixed preamble (magic, type, total length, flags), a
//! payload and a trailing CRC-32 over the flags byte and the payload.
//! Frames are self-delimiting and can be read back to back from one
//! buffer.
//!
//! This crate provides:
//! - [`Frame`] with [`encode_frame`] and [`decode_frame`]
//! - [`DataBody`] for data frames carrying an offset table
//! - [`HandshakePayload`] and [`ErrorPayload`]
//!
//! This is a pure codec crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod payload;

pub use error::{WireError, WireResult};
pub use frame::{
    decode_frame, encode_frame, Frame, FrameFlags, FrameType, CRC_SIZE, FRAME_MAGIC,
    MIN_FRAME_SIZE, PREAMBLE_SIZE,
};
pub use payload::{DataBody, ErrorPayload, HandshakePayload, HANDSHAKE_FIXED_SIZE};
