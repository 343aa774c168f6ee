//! Typed payloads for data, handshake and error frames.

use crate::error::{WireError, WireResult};
use crate::frame::FrameFlags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use dbflat_codec::{decode_varuint, varuint_len, write_varuint, MAX_VARINT_LEN};

/// Fixed part of a handshake payload: version mask, MTU and timeout.
pub const HANDSHAKE_FIXED_SIZE: usize = 10;

fn put_varuint(out: &mut BytesMut, value: u64) {
    let mut scratch = Vec::with_capacity(MAX_VARINT_LEN);
    write_varuint(&mut scratch, value);
    out.put_slice(&scratch);
}

/// Body of a data frame.
///
/// With an offset table the body is `varint(count) | offsets | payload`,
/// each offset marking where one record starts inside `payload`. Offsets
/// are `u32` LE, or varint deltas from the previous offset when the frame
/// carries [`FrameFlags::OFFSET_TABLE_COMPRESSED`].
///
/// Offsets are always non-decreasing and within the payload; every
/// constructor checks this.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataBody {
    offsets: Vec<u32>,
    payload: Bytes,
}

/// Offsets must be non-decreasing and the last must not pass `len`.
fn check_offsets(offsets: &[u32], len: usize) -> WireResult<()> {
    if offsets.windows(2).any(|pair| pair[1] < pair[0]) {
        return Err(WireError::malformed("offsets not ascending"));
    }
    if offsets.last().is_some_and(|&last| last as usize > len) {
        return Err(WireError::malformed("offset past payload"));
    }
    Ok(())
}

impl DataBody {
    /// A body without an offset table.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            offsets: Vec::new(),
            payload: payload.into(),
        }
    }

    /// A body with an explicit offset table.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MalformedPayload`] when offsets decrease or an
    /// offset lies past the payload.
    pub fn with_offsets(offsets: Vec<u32>, payload: impl Into<Bytes>) -> WireResult<Self> {
        let payload = payload.into();
        check_offsets(&offsets, payload.len())?;
        Ok(Self { offsets, payload })
    }

    /// Concatenate `records` and index each one.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::FrameTooLarge`] if an offset does not fit in 32 bits.
    pub fn from_records<R: AsRef<[u8]>>(records: &[R]) -> WireResult<Self> {
        let size: usize = records.iter().map(|r| r.as_ref().len()).sum();
        let mut payload = BytesMut::with_capacity(size);
        let mut offsets = Vec::with_capacity(records.len());
        for record in records {
            let offset = u32::try_from(payload.len())
                .map_err(|_| WireError::FrameTooLarge { size })?;
            offsets.push(offset);
            payload.put_slice(record.as_ref());
        }
        Ok(Self {
            offsets,
            payload: payload.freeze(),
        })
    }

    /// Record start offsets into the payload.
    #[must_use]
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Concatenated record bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether this body has an offset table.
    #[must_use]
    pub fn has_offset_table(&self) -> bool {
        !self.offsets.is_empty()
    }

    /// Number of records [`DataBody::records`] yields.
    #[must_use]
    pub fn record_count(&self) -> usize {
        match (self.offsets.len(), self.payload.is_empty()) {
            (0, true) => 0,
            (0, false) => 1,
            (n, _) => n,
        }
    }

    /// The records delimited by the offset table.
    ///
    /// Without a table a non-empty payload is one record and an empty
    /// payload is none.
    pub fn records(&self) -> impl Iterator<Item = Bytes> + '_ {
        let len = self.payload.len();
        let table = !self.offsets.is_empty();
        (0..self.record_count()).map(move |i| {
            if !table {
                return self.payload.clone();
            }
            let start = self.offsets[i] as usize;
            let end = self.offsets.get(i + 1).map_or(len, |&o| o as usize);
            self.payload.slice(start..end)
        })
    }

    pub(crate) fn encoded_len(&self, flags: FrameFlags) -> usize {
        if !flags.contains(FrameFlags::HAS_OFFSET_TABLE) {
            return self.payload.len();
        }
        let table = if flags.contains(FrameFlags::OFFSET_TABLE_COMPRESSED) {
            let mut prev = 0u32;
            self.offsets
                .iter()
                .map(|&o| {
                    let delta = o - prev;
                    prev = o;
                    varuint_len(u64::from(delta))
                })
                .sum()
        } else {
            self.offsets.len() * 4
        };
        varuint_len(self.offsets.len() as u64) + table + self.payload.len()
    }

    pub(crate) fn encode_into(&self, flags: FrameFlags, out: &mut BytesMut) {
        if flags.contains(FrameFlags::HAS_OFFSET_TABLE) {
            put_varuint(out, self.offsets.len() as u64);
            if flags.contains(FrameFlags::OFFSET_TABLE_COMPRESSED) {
                let mut prev = 0u32;
                for &offset in &self.offsets {
                    put_varuint(out, u64::from(offset - prev));
                    prev = offset;
                }
            } else {
                for &offset in &self.offsets {
                    out.put_u32_le(offset);
                }
            }
        }
        out.put_slice(&self.payload);
    }

    /// Parse a data body according to `flags`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MalformedPayload`] when the table runs past the
    /// body, when offsets decrease, or when an offset lies past the payload.
    pub fn decode(body: &Bytes, flags: FrameFlags) -> WireResult<Self> {
        if !flags.contains(FrameFlags::HAS_OFFSET_TABLE) {
            return Ok(Self::new(body.clone()));
        }
        let (count, mut pos) = decode_varuint(body)?;
        // Every entry takes at least one byte.
        let count = usize::try_from(count)
            .ok()
            .filter(|&count| count <= body.len() - pos)
            .ok_or(WireError::malformed("offset count exceeds body"))?;

        let mut offsets = Vec::with_capacity(count);
        let mut prev = 0u32;
        for _ in 0..count {
            let offset = if flags.contains(FrameFlags::OFFSET_TABLE_COMPRESSED) {
                let (delta, used) = decode_varuint(&body[pos..])?;
                pos += used;
                u32::try_from(delta)
                    .ok()
                    .and_then(|delta| prev.checked_add(delta))
                    .ok_or(WireError::malformed("offset overflows u32"))?
            } else {
                let mut entry = body
                    .get(pos..pos + 4)
                    .ok_or(WireError::malformed("offset table truncated"))?;
                pos += 4;
                entry.get_u32_le()
            };
            if offset < prev {
                return Err(WireError::malformed("offsets not ascending"));
            }
            offsets.push(offset);
            prev = offset;
        }

        Self::with_offsets(offsets, body.slice(pos..))
    }
}

/// Connection parameters exchanged at the start of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HandshakePayload {
    /// Bit `n` set means protocol version `n` is supported.
    pub version_mask: u32,
    /// Largest frame the sender accepts.
    pub mtu: u16,
    /// Idle timeout in milliseconds.
    pub timeout_ms: u32,
    /// Supported compressor ids.
    pub alg_codes: Vec<u8>,
}

impl HandshakePayload {
    /// Encoded size.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HANDSHAKE_FIXED_SIZE + self.alg_codes.len()
    }

    /// Append the payload to `out`.
    pub fn encode_into(&self, out: &mut BytesMut) {
        out.put_u32_le(self.version_mask);
        out.put_u16_le(self.mtu);
        out.put_u32_le(self.timeout_ms);
        out.put_slice(&self.alg_codes);
    }

    /// Parse a handshake payload.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MalformedPayload`] if `bytes` is shorter than
    /// the fixed part.
    pub fn decode(mut bytes: &[u8]) -> WireResult<Self> {
        if bytes.len() < HANDSHAKE_FIXED_SIZE {
            return Err(WireError::malformed("handshake too short"));
        }
        let version_mask = bytes.get_u32_le();
        let mtu = bytes.get_u16_le();
        let timeout_ms = bytes.get_u32_le();
        Ok(Self {
            version_mask,
            mtu,
            timeout_ms,
            alg_codes: bytes.to_vec(),
        })
    }

    /// Whether both sides share at least one protocol version.
    #[must_use]
    pub const fn compatible_with(&self, other: &Self) -> bool {
        self.version_mask & other.version_mask != 0
    }
}

/// Error report: a code and optional detail bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Application error code.
    pub code: u8,
    /// Detail bytes, often a UTF-8 message.
    pub data: Bytes,
}

impl ErrorPayload {
    /// An error payload.
    pub fn new(code: u8, data: impl Into<Bytes>) -> Self {
        Self {
            code,
            data: data.into(),
        }
    }

    /// Append the payload to `out`.
    pub fn encode_into(&self, out: &mut BytesMut) {
        out.put_u8(self.code);
        out.put_slice(&self.data);
    }

    /// Parse an error payload.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MalformedPayload`] if `bytes` is empty.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let (&code, data) = bytes
            .split_first()
            .ok_or(WireError::malformed("empty error payload"))?;
        Ok(Self::new(code, Bytes::copy_from_slice(data)))
    }

    /// Detail bytes as text, if they are valid UTF-8.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{decode_frame, encode_frame, Frame, FrameType};
    use proptest::prelude::*;

    fn through_wire(frame: &Frame) -> Frame {
        let mut out = BytesMut::new();
        encode_frame(frame, &mut out).unwrap();
        let (decoded, used) = decode_frame(&out).unwrap();
        assert_eq!(used, out.len());
        decoded
    }

    #[test]
    fn data_frame_with_offset_table() {
        let body = DataBody::from_records(&[&b"first"[..], b"", b"third!"]).unwrap();
        assert_eq!(body.offsets, vec![0, 5, 5]);

        let frame = through_wire(&Frame::data(&body, FrameFlags::END_OF_MESSAGE));
        assert!(frame.flags.contains(FrameFlags::HAS_OFFSET_TABLE));
        assert!(frame.flags.contains(FrameFlags::END_OF_MESSAGE));
        // varint(3) + 3 * u32 + 11 payload bytes
        assert_eq!(frame.payload.len(), 1 + 12 + 11);

        let decoded = frame.data_body().unwrap();
        assert_eq!(decoded, body);
        let records: Vec<Bytes> = decoded.records().collect();
        assert_eq!(records, vec![&b"first"[..], b"", b"third!"]);
    }

    #[test]
    fn compressed_offset_table_is_smaller() {
        let records: Vec<Vec<u8>> = (0..20).map(|i| vec![i as u8; 10]).collect();
        let body = DataBody::from_records(&records).unwrap();
        let plain = Frame::data(&body, FrameFlags::NONE);
        let packed = Frame::data(&body, FrameFlags::OFFSET_TABLE_COMPRESSED);
        assert!(packed.payload.len() < plain.payload.len());
        assert_eq!(through_wire(&packed).data_body().unwrap(), body);
    }

    #[test]
    fn body_without_table() {
        let body = DataBody::new(&b"single record"[..]);
        let frame = Frame::data(&body, FrameFlags::OFFSET_TABLE_COMPRESSED);
        assert_eq!(frame.flags, FrameFlags::NONE);
        assert_eq!(&frame.payload[..], b"single record");
        let records: Vec<Bytes> = frame.data_body().unwrap().records().collect();
        assert_eq!(records, vec![&b"single record"[..]]);
    }

    #[test]
    fn malformed_offset_tables() {
        let flags = FrameFlags::HAS_OFFSET_TABLE;
        // count larger than the body
        let body = Bytes::from_static(&[0x05, 0x00]);
        assert!(matches!(
            DataBody::decode(&body, flags),
            Err(WireError::MalformedPayload { .. })
        ));
        // decreasing offsets
        let body = Bytes::from_static(&[2, 4, 0, 0, 0, 1, 0, 0, 0, b'a', b'b', b'c', b'd']);
        assert_eq!(
            DataBody::decode(&body, flags),
            Err(WireError::malformed("offsets not ascending"))
        );
        // offset past payload
        let body = Bytes::from_static(&[1, 9, 0, 0, 0, b'a']);
        assert_eq!(
            DataBody::decode(&body, flags),
            Err(WireError::malformed("offset past payload"))
        );
        // unterminated count
        let body = Bytes::from_static(&[0x80]);
        assert!(matches!(
            DataBody::decode(&body, flags),
            Err(WireError::Codec(_))
        ));
    }

    #[test]
    fn explicit_offsets_are_checked() {
        assert_eq!(
            DataBody::with_offsets(vec![4, 2], &b"abcdef"[..]),
            Err(WireError::malformed("offsets not ascending"))
        );
        assert_eq!(
            DataBody::with_offsets(vec![0, 7], &b"abcdef"[..]),
            Err(WireError::malformed("offset past payload"))
        );

        let descending = Bytes::from_static(b"\x02\x04\x00\x00\x00\x02\x00\x00\x00abcdef");
        assert_eq!(
            DataBody::decode(&descending, FrameFlags::HAS_OFFSET_TABLE),
            Err(WireError::malformed("offsets not ascending"))
        );
        let past_end = Bytes::from_static(b"\x01\x09\x00\x00\x00abc");
        assert_eq!(
            DataBody::decode(&past_end, FrameFlags::HAS_OFFSET_TABLE),
            Err(WireError::malformed("offset past payload"))
        );

        let body = DataBody::with_offsets(vec![0, 2, 2], &b"abcdef"[..]).unwrap();
        let records: Vec<Bytes> = body.records().collect();
        assert_eq!(records, vec![&b"ab"[..], &b""[..], &b"cdef"[..]]);

        let flags = FrameFlags::HAS_OFFSET_TABLE | FrameFlags::OFFSET_TABLE_COMPRESSED;
        let received = through_wire(&Frame::data(&body, flags)).data_body().unwrap();
        assert_eq!(received.offsets(), &[0, 2, 2]);
        assert_eq!(received, body);
    }

    #[test]
    fn empty_bodies_hold_no_records() {
        let none: &[&[u8]] = &[];
        let body = DataBody::from_records(none).unwrap();
        assert_eq!(body.record_count(), 0);
        assert_eq!(body.records().count(), 0);
        let received = through_wire(&Frame::data(&body, FrameFlags::NONE)).data_body().unwrap();
        assert_eq!(received.records().count(), 0);

        assert_eq!(DataBody::new(Bytes::new()).records().count(), 0);

        let one_empty = DataBody::from_records(&[&b""[..]]).unwrap();
        assert_eq!(one_empty.records().collect::<Vec<_>>(), vec![Bytes::new()]);
    }

    #[test]
    fn handshake_roundtrip() {
        let hello = HandshakePayload {
            version_mask: 0b11,
            mtu: 1400,
            timeout_ms: 30_000,
            alg_codes: vec![0, 1, 2, 4],
        };
        let frame = through_wire(&Frame::handshake(&hello));
        assert_eq!(frame.frame_type, FrameType::Handshake);
        assert_eq!(frame.payload.len(), HANDSHAKE_FIXED_SIZE + 4);
        let decoded = frame.handshake_payload().unwrap();
        assert_eq!(decoded, hello);

        let old = HandshakePayload {
            version_mask: 0b01,
            ..HandshakePayload::default()
        };
        assert!(old.compatible_with(&hello));
        assert!(!HandshakePayload::default().compatible_with(&hello));
    }

    #[test]
    fn short_handshake() {
        assert_eq!(
            HandshakePayload::decode(&[1, 2, 3]),
            Err(WireError::malformed("handshake too short"))
        );
    }

    #[test]
    fn error_frame() {
        let report = ErrorPayload::new(7, &b"unknown compressor"[..]);
        let decoded = through_wire(&Frame::error(&report)).error_payload().unwrap();
        assert_eq!(decoded.code, 7);
        assert_eq!(decoded.message(), Some("unknown compressor"));
        assert!(ErrorPayload::decode(&[]).is_err());
    }

    proptest! {
        #[test]
        fn data_bodies_survive_the_wire(
            records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..16),
            compressed in any::<bool>(),
        ) {
            let body = DataBody::from_records(&records).unwrap();
            let extra = if compressed { FrameFlags::OFFSET_TABLE_COMPRESSED } else { FrameFlags::NONE };
            let decoded = through_wire(&Frame::data(&body, extra)).data_body().unwrap();
            let got: Vec<Vec<u8>> = decoded.records().map(|r| r.to_vec()).collect();
            prop_assert_eq!(got, records);
        }

        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            let _ = decode_frame(&bytes);
            let _ = DataBody::decode(&Bytes::from(bytes.clone()), FrameFlags::HAS_OFFSET_TABLE | FrameFlags::OFFSET_TABLE_COMPRESSED);
            let _ = DataBody::decode(&Bytes::from(bytes), FrameFlags::HAS_OFFSET_TABLE);
        }
    }
}
