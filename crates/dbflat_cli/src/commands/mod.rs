//! CLI command implementations.

pub mod decode;
pub mod encode;
pub mod inspect;
pub mod verify;

use dbflat_core::{Decoder, Layout, Schema};
use std::path::Path;
use std::sync::Arc;

/// Result type shared by the commands.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// One self-contained piece of a record file.
#[derive(Debug, Clone, Copy)]
pub struct Unit<'a> {
    /// Byte offset in the file.
    pub offset: usize,
    /// Record or tag-walk stream.
    pub layout: Layout,
    /// The unit's bytes.
    pub bytes: &'a [u8],
}

/// Split `buf` into back-to-back records.
///
/// Header-bearing records are delimited by their header; anything that
/// does not start with the record magic is a tag-walk stream running to
/// the end of the file.
pub fn split_units<'a>(decoder: &Decoder, buf: &'a [u8]) -> CommandResult<Vec<Unit<'a>>> {
    let mut units = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        let rest = &buf[pos..];
        match Layout::detect(rest) {
            Layout::Record => {
                let (_, end) = decoder
                    .header(rest)
                    .map_err(|e| format!("record at offset {pos}: {e}"))?;
                units.push(Unit {
                    offset: pos,
                    layout: Layout::Record,
                    bytes: &rest[..end],
                });
                pos += end;
            }
            Layout::TagWalk => {
                units.push(Unit {
                    offset: pos,
                    layout: Layout::TagWalk,
                    bytes: rest,
                });
                break;
            }
        }
    }
    Ok(units)
}

/// Load the optional schema and build a decoder that knows its widths.
pub fn load_decoder(schema: Option<&Path>) -> CommandResult<(Decoder, Option<Arc<Schema>>)> {
    match schema {
        Some(path) => {
            let schema = Arc::new(Schema::load(path)?);
            Ok((Decoder::with_widths(schema.clone()), Some(schema)))
        }
        None => Ok((Decoder::default(), None)),
    }
}

/// Payload as UTF-8 when every character is printable.
pub fn printable(bytes: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(bytes).ok()?;
    if text.chars().all(|c| !c.is_control() || c == '\n' || c == '\t') {
        Some(text)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbflat_core::{Encoder, Field, LayoutPlan, Strategy};

    #[test]
    fn split_records_then_stream() {
        let fields = [Field::array(1, b"a"), Field::array(2, b"bb")];
        let encoder = Encoder::default();
        let mut file = encoder.encode_to_vec(&LayoutPlan::new(&fields[..])).unwrap();
        let first = file.len();
        file.extend(
            encoder
                .encode_to_vec(&LayoutPlan::new(&fields[..]).strategy(Strategy::HotVTable))
                .unwrap(),
        );
        let second = file.len();
        file.extend(
            encoder
                .encode_to_vec(&LayoutPlan::new(&fields[..]).strategy(Strategy::TagWalk))
                .unwrap(),
        );

        let units = split_units(&Decoder::default(), &file).unwrap();
        let shape: Vec<(usize, Layout)> = units.iter().map(|u| (u.offset, u.layout)).collect();
        assert_eq!(
            shape,
            vec![
                (0, Layout::Record),
                (first, Layout::Record),
                (second, Layout::TagWalk)
            ]
        );
    }

    #[test]
    fn split_reports_offset_of_bad_record() {
        let fields = [Field::array(1, b"a")];
        let mut file = Encoder::default()
            .encode_to_vec(&LayoutPlan::new(&fields[..]))
            .unwrap();
        let len = file.len();
        let cut = file[..len - 1].to_vec();
        file.extend_from_slice(&cut);
        let err = split_units(&Decoder::default(), &file).unwrap_err();
        assert!(err.to_string().contains(&format!("offset {len}")));
    }

    #[test]
    fn printable_text() {
        assert_eq!(printable(b"hello world"), Some("hello world"));
        assert_eq!(printable(&[0xff, 0x00]), None);
        assert_eq!(printable(&[b'a', 0x01]), None);
    }
}
