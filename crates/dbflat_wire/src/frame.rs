//! Frame preamble, checksum and the frame codec.
//!
//! ```text
//! magic u16 LE | type u8 | total_length u32 LE | flags u8 | payload | crc32 u32 LE
//! ```
//!
//! `total_length` counts every byte of the frame, preamble and checksum
//! included. The CRC-32 (IEEE) covers the flags byte and the payload.

use crate::error::{WireError, WireResult};
use crate::payload::{DataBody, ErrorPayload, HandshakePayload};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Frame magic number.
pub const FRAME_MAGIC: u16 = 0xC5A3;

/// Bytes before the payload.
pub const PREAMBLE_SIZE: usize = 8;

/// Bytes of the trailing checksum.
pub const CRC_SIZE: usize = 4;

/// Size of a frame with an empty payload.
pub const MIN_FRAME_SIZE: usize = PREAMBLE_SIZE + CRC_SIZE;

/// Kind of frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Record data.
    Data = 1,
    /// Connection parameters.
    Handshake = 2,
    /// Error report.
    Error = 3,
    /// Application-defined control message.
    Control = 4,
}

impl FrameType {
    /// Wire code of this type.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = WireError;

    fn try_from(code: u8) -> WireResult<Self> {
        match code {
            1 => Ok(Self::Data),
            2 => Ok(Self::Handshake),
            3 => Ok(Self::Error),
            4 => Ok(Self::Control),
            _ => Err(WireError::UnknownFrameType { code }),
        }
    }
}

/// The flags byte of a frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The data body starts with an offset table.
    pub const HAS_OFFSET_TABLE: Self = Self(1 << 0);
    /// Last frame of a message.
    pub const END_OF_MESSAGE: Self = Self(1 << 1);
    /// The message continues in later frames.
    pub const FRAGMENTED: Self = Self(1 << 2);
    /// The sender also checks a CRC-32C; informational only.
    pub const CRC32C: Self = Self(1 << 3);
    /// Offset table entries are varint deltas instead of `u32` values.
    pub const OFFSET_TABLE_COMPRESSED: Self = Self(1 << 5);

    /// Wrap a raw flags byte.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw flags byte.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `self` with the bits of `other` cleared.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// `self` with the bits of `other` set.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for FrameFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for FrameFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameFlags({:#010b})", self.0)
    }
}

/// One decoded or to-be-encoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind.
    pub frame_type: FrameType,
    /// Flags byte.
    pub flags: FrameFlags,
    /// Payload bytes, without preamble or checksum.
    pub payload: Bytes,
}

impl Frame {
    /// A frame with an arbitrary payload.
    pub fn new(frame_type: FrameType, flags: FrameFlags, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            flags,
            payload: payload.into(),
        }
    }

    /// A data frame carrying `body`.
    ///
    /// `extra` may carry the end-of-message, fragmented, CRC-32C and
    /// offset-table-compressed bits. The offset-table bit is derived from
    /// the body.
    #[must_use]
    pub fn data(body: &DataBody, extra: FrameFlags) -> Self {
        let mut flags = extra.difference(FrameFlags::HAS_OFFSET_TABLE);
        if body.has_offset_table() {
            flags |= FrameFlags::HAS_OFFSET_TABLE;
        } else {
            flags = flags.difference(FrameFlags::OFFSET_TABLE_COMPRESSED);
        }
        let mut payload = BytesMut::with_capacity(body.encoded_len(flags));
        body.encode_into(flags, &mut payload);
        Self::new(FrameType::Data, flags, payload.freeze())
    }

    /// A handshake frame.
    #[must_use]
    pub fn handshake(handshake: &HandshakePayload) -> Self {
        let mut payload = BytesMut::with_capacity(handshake.encoded_len());
        handshake.encode_into(&mut payload);
        Self::new(FrameType::Handshake, FrameFlags::NONE, payload.freeze())
    }

    /// An error frame.
    #[must_use]
    pub fn error(error: &ErrorPayload) -> Self {
        let mut payload = BytesMut::with_capacity(1 + error.data.len());
        error.encode_into(&mut payload);
        Self::new(FrameType::Error, FrameFlags::NONE, payload.freeze())
    }

    /// A control frame with an opaque payload.
    pub fn control(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Control, FrameFlags::NONE, payload)
    }

    /// Size of this frame once encoded.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        MIN_FRAME_SIZE + self.payload.len()
    }

    fn expect_type(&self, expected: FrameType) -> WireResult<()> {
        if self.frame_type == expected {
            Ok(())
        } else {
            Err(WireError::WrongFrameType {
                expected,
                actual: self.frame_type,
            })
        }
    }

    /// Parse the payload of a data frame.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::WrongFrameType`] for other frame types, or a
    /// payload error if the offset table is malformed.
    pub fn data_body(&self) -> WireResult<DataBody> {
        self.expect_type(FrameType::Data)?;
        DataBody::decode(&self.payload, self.flags)
    }

    /// Parse the payload of a handshake frame.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::WrongFrameType`] for other frame types, or
    /// [`WireError::MalformedPayload`] if the payload is too short.
    pub fn handshake_payload(&self) -> WireResult<HandshakePayload> {
        self.expect_type(FrameType::Handshake)?;
        HandshakePayload::decode(&self.payload)
    }

    /// Parse the payload of an error frame.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::WrongFrameType`] for other frame types, or
    /// [`WireError::MalformedPayload`] if the payload is empty.
    pub fn error_payload(&self) -> WireResult<ErrorPayload> {
        self.expect_type(FrameType::Error)?;
        ErrorPayload::decode(&self.payload)
    }
}

fn checksum(flags: u8, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[flags]);
    hasher.update(payload);
    hasher.finalize()
}

/// Append `frame` to `out`, returning the number of bytes written.
///
/// # Errors
///
/// Returns [`WireError::FrameTooLarge`] if the frame length does not fit
/// in 32 bits; `out` is untouched in that case.
pub fn encode_frame(frame: &Frame, out: &mut BytesMut) -> WireResult<usize> {
    let total = frame.encoded_len();
    let declared = u32::try_from(total).map_err(|_| WireError::FrameTooLarge { size: total })?;
    out.reserve(total);
    out.put_u16_le(FRAME_MAGIC);
    out.put_u8(frame.frame_type.code());
    out.put_u32_le(declared);
    out.put_u8(frame.flags.bits());
    out.put_slice(&frame.payload);
    out.put_u32_le(checksum(frame.flags.bits(), &frame.payload));
    Ok(total)
}

/// Decode the frame at the front of `buf`.
///
/// Returns the frame and the number of bytes it occupied, so a caller can
/// continue with the next frame at that offset. Trailing bytes are left
/// alone.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] when `buf` is shorter than the frame,
/// and magic, type, length or checksum errors for corrupt frames.
pub fn decode_frame(buf: &[u8]) -> WireResult<(Frame, usize)> {
    if buf.len() < PREAMBLE_SIZE {
        return Err(WireError::truncated(PREAMBLE_SIZE, buf.len()));
    }
    let mut preamble = &buf[..PREAMBLE_SIZE];
    let magic = preamble.get_u16_le();
    if magic != FRAME_MAGIC {
        return Err(WireError::BadMagic { found: magic });
    }
    let frame_type = FrameType::try_from(preamble.get_u8())?;
    let declared = preamble.get_u32_le();
    let flags = FrameFlags::from_bits(preamble.get_u8());

    let total = usize::try_from(declared).map_err(|_| WireError::LengthMismatch { declared })?;
    if total < MIN_FRAME_SIZE {
        return Err(WireError::LengthMismatch { declared });
    }
    if buf.len() < total {
        return Err(WireError::truncated(total, buf.len()));
    }

    let payload = &buf[PREAMBLE_SIZE..total - CRC_SIZE];
    let mut trailer = &buf[total - CRC_SIZE..total];
    let stored = trailer.get_u32_le();
    let computed = checksum(flags.bits(), payload);
    if stored != computed {
        return Err(WireError::ChecksumMismatch { stored, computed });
    }

    Ok((
        Frame::new(frame_type, flags, Bytes::copy_from_slice(payload)),
        total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(frame: &Frame) -> Vec<u8> {
        let mut out = BytesMut::new();
        encode_frame(frame, &mut out).unwrap();
        out.to_vec()
    }

    #[test]
    fn preamble_layout() {
        let frame = Frame::control(&b"ping"[..]);
        let bytes = encode(&frame);
        assert_eq!(bytes.len(), MIN_FRAME_SIZE + 4);
        assert_eq!(&bytes[0..2], &[0xA3, 0xC5]);
        assert_eq!(bytes[2], 4);
        assert_eq!(u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]), 16);
        assert_eq!(bytes[7], 0);
        assert_eq!(&bytes[8..12], b"ping");
        let crc = crc32fast::hash(&[0, b'p', b'i', b'n', b'g']);
        assert_eq!(&bytes[12..], &crc.to_le_bytes());
    }

    #[test]
    fn decode_returns_consumed_length() {
        let mut out = BytesMut::new();
        let first = Frame::control(&b"one"[..]);
        let second = Frame::new(FrameType::Data, FrameFlags::END_OF_MESSAGE, &b"two!"[..]);
        let a = encode_frame(&first, &mut out).unwrap();
        encode_frame(&second, &mut out).unwrap();

        let (decoded, used) = decode_frame(&out).unwrap();
        assert_eq!(used, a);
        assert_eq!(decoded, first);
        let (decoded, used) = decode_frame(&out[a..]).unwrap();
        assert_eq!(decoded, second);
        assert_eq!(a + used, out.len());
    }

    #[test]
    fn empty_payload() {
        let frame = Frame::control(Bytes::new());
        let bytes = encode(&frame);
        assert_eq!(bytes.len(), MIN_FRAME_SIZE);
        assert_eq!(decode_frame(&bytes).unwrap().0, frame);
    }

    #[test]
    fn bad_magic() {
        let mut bytes = encode(&Frame::control(&b"x"[..]));
        bytes[0] = 0;
        assert!(matches!(
            decode_frame(&bytes),
            Err(WireError::BadMagic { found: 0xC500 })
        ));
    }

    #[test]
    fn unknown_type() {
        let mut bytes = encode(&Frame::control(&b"x"[..]));
        bytes[2] = 9;
        assert_eq!(
            decode_frame(&bytes),
            Err(WireError::UnknownFrameType { code: 9 })
        );
    }

    #[test]
    fn truncated_at_every_cut() {
        let bytes = encode(&Frame::control(&b"payload"[..]));
        for cut in 0..bytes.len() {
            assert!(
                matches!(decode_frame(&bytes[..cut]), Err(WireError::Truncated { .. })),
                "cut {cut}"
            );
        }
    }

    #[test]
    fn length_below_minimum() {
        let mut bytes = encode(&Frame::control(&b"abc"[..]));
        bytes[3..7].copy_from_slice(&5u32.to_le_bytes());
        assert_eq!(
            decode_frame(&bytes),
            Err(WireError::LengthMismatch { declared: 5 })
        );
    }

    #[test]
    fn checksum_covers_flags_and_payload() {
        let bytes = encode(&Frame::control(&b"abc"[..]));

        let mut flipped = bytes.clone();
        flipped[7] ^= FrameFlags::FRAGMENTED.bits();
        assert!(matches!(
            decode_frame(&flipped),
            Err(WireError::ChecksumMismatch { .. })
        ));

        let mut flipped = bytes;
        flipped[9] ^= 0xFF;
        assert!(matches!(
            decode_frame(&flipped),
            Err(WireError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn frame_type_codes() {
        for ty in [
            FrameType::Data,
            FrameType::Handshake,
            FrameType::Error,
            FrameType::Control,
        ] {
            assert_eq!(FrameType::try_from(ty.code()).unwrap(), ty);
        }
        assert!(FrameType::try_from(0).is_err());
    }

    #[test]
    fn typed_accessors_check_type() {
        let frame = Frame::control(&b"x"[..]);
        assert_eq!(
            frame.handshake_payload(),
            Err(WireError::WrongFrameType {
                expected: FrameType::Handshake,
                actual: FrameType::Control,
            })
        );
    }

    #[test]
    fn flags_helpers() {
        let flags = FrameFlags::END_OF_MESSAGE | FrameFlags::FRAGMENTED;
        assert!(flags.contains(FrameFlags::END_OF_MESSAGE));
        assert!(!flags.contains(FrameFlags::HAS_OFFSET_TABLE));
        assert_eq!(flags.difference(FrameFlags::FRAGMENTED), FrameFlags::END_OF_MESSAGE);
        assert_eq!(flags.bits(), 0b110);
    }
}
