//! Fuzz testing harnesses for DBFlat.
//!
//! These targets can be driven by cargo-fuzz or any other fuzzer. Every
//! target must return normally for arbitrary input: decoders report
//! errors, they never panic.

use dbflat_core::{
    CompFlags, Decoder, Encoder, FieldBuf, Inspector, Layout, LayoutPlan, MAX_HOT_TAG,
};
use dbflat_wire::{decode_frame, encode_frame, FrameType};
use std::collections::HashMap;
use std::sync::Arc;

fn fuzz_decoder() -> Decoder {
    // Give a few tags a width so fixed-width paths are reachable.
    let widths: HashMap<u16, usize> = [(1, 1), (2, 2), (3, 4), (4, 8)].into_iter().collect();
    Decoder::with_widths(Arc::new(widths))
}

/// Fuzz target for layout dispatch and full decoding.
///
/// Any buffer either decodes or returns an error. When it decodes, every
/// hot tag must be readable through the hot path with the same payload.
pub fn fuzz_decode_any(data: &[u8]) {
    let decoder = fuzz_decoder();
    let Ok(record) = decoder.decode_any(data) else {
        return;
    };
    if Layout::detect(data) != Layout::Record {
        return;
    }
    let Some(header) = record.header().copied() else {
        return;
    };
    for tag in header.hot_bitmap.tags() {
        if let (Ok(hot), Some(full)) = (decoder.read_hot_field(data, tag, 0), record.payload(tag))
        {
            assert_eq!(&*hot, full, "hot path disagrees for tag {tag}");
        }
    }
}

/// Fuzz target for tag-walk streams and the inspector cursor.
///
/// Walking with the cursor must see the same tuples that
/// `decode_tag_walk_all` returns, when the latter succeeds.
pub fn fuzz_tag_walk(data: &[u8]) {
    let decoder = fuzz_decoder();
    let _ = decoder.find_with_tag(data, 1);
    let _ = decoder.decode_tag_walk(data, data.len() / 2);

    let Ok(mut inspector) = Inspector::with_buffer(decoder.clone(), data) else {
        return;
    };
    let mut walked = Vec::new();
    loop {
        match inspector.next() {
            Ok(Some(field)) => walked.push(field),
            Ok(None) | Err(_) => break,
        }
    }
    if inspector.layout() == Layout::TagWalk {
        if let Ok(all) = decoder.decode_tag_walk_all(data) {
            assert_eq!(walked.len(), all.len(), "cursor and full walk disagree");
        }
    }
}

/// Fuzz target for the frame codec.
///
/// A frame that decodes must re-encode to the exact bytes it came from.
pub fn fuzz_frame_decode(data: &[u8]) {
    let Ok((frame, used)) = decode_frame(data) else {
        return;
    };
    match frame.frame_type {
        FrameType::Data => {
            let _ = frame.data_body();
        }
        FrameType::Handshake => {
            let _ = frame.handshake_payload();
        }
        FrameType::Error => {
            let _ = frame.error_payload();
        }
        FrameType::Control => {}
    }
    let mut out = bytes::BytesMut::new();
    if encode_frame(&frame, &mut out).is_ok() {
        assert_eq!(&out[..], &data[..used], "frame did not re-encode identically");
    }
}

/// Fuzz target for encoder-decoder round trips.
///
/// Interprets `data` as a list of `(tag, flags, len, bytes)` entries and
/// checks that whatever the encoder accepts decodes to the same fields.
pub fn fuzz_encode_roundtrip(data: &[u8]) {
    let mut fields: Vec<FieldBuf> = Vec::new();
    let mut pos = 0;
    while pos + 3 <= data.len() {
        let tag = u16::from(data[pos] % 24) + 1;
        let compressor = data[pos + 1] % 5;
        let len = usize::from(data[pos + 2] % 32);
        pos += 3;
        let end = (pos + len).min(data.len());
        let payload = data[pos..end].to_vec();
        pos = end;
        if fields.iter().any(|f| f.tag == tag) {
            continue;
        }
        fields.push(FieldBuf::new(tag, CompFlags::array(compressor), payload));
    }
    let hot: Vec<u16> = (1..=MAX_HOT_TAG).filter(|t| t % 2 == 1).collect();

    let decoder = Decoder::default();
    for strategy in [
        dbflat_core::Strategy::FullVTable,
        dbflat_core::Strategy::HotVTable,
        dbflat_core::Strategy::TagWalk,
    ] {
        let plan = LayoutPlan::new(&fields).strategy(strategy).hot_tags(&hot);
        let Ok(buf) = Encoder::default().encode_to_vec(&plan) else {
            // Compressor 3 is reserved and has no codec.
            assert!(fields.iter().any(|f| f.comp_flags.compressor() == 3));
            return;
        };
        let record = decoder
            .decode_any(&buf)
            .unwrap_or_else(|e| panic!("{strategy}: encoded record failed to decode: {e}"));
        assert_eq!(record.len(), fields.len(), "{strategy}");
        for field in &fields {
            assert_eq!(
                record.payload(field.tag),
                Some(&field.payload[..]),
                "{strategy}: tag {}",
                field.tag
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::PropertyBudget;
    use proptest::prelude::*;

    #[test]
    fn targets_accept_empty_input() {
        fuzz_decode_any(&[]);
        fuzz_tag_walk(&[]);
        fuzz_frame_decode(&[]);
        fuzz_encode_roundtrip(&[]);
    }

    #[test]
    fn targets_accept_magic_prefix() {
        let mut data = 0x4442_4633u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0, 1, 0, 0]);
        data.resize(48, 0xff);
        fuzz_decode_any(&data);
        fuzz_tag_walk(&data);
    }

    proptest! {
        #![proptest_config(PropertyBudget::smoke().proptest_config())]

        #[test]
        fn decode_any_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
            fuzz_decode_any(&data);
        }

        #[test]
        fn tag_walk_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
            fuzz_tag_walk(&data);
        }

        #[test]
        fn frame_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..128)) {
            fuzz_frame_decode(&data);
        }

        #[test]
        fn encode_roundtrip_holds(data in prop::collection::vec(any::<u8>(), 0..256)) {
            fuzz_encode_roundtrip(&data);
        }
    }
}
