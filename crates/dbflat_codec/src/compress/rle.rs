//! Byte-oriented run-length coding.
//!
//! The blob is a sequence of `(run_length, byte)` pairs with
//! `1 <= run_length <= 255`.

use super::Compressor;
use crate::error::{CodecError, CodecResult};

const NAME: &str = "rle";

/// Run-length compressor, id 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLength;

impl Compressor for RunLength {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        let mut iter = raw.iter().copied();
        let Some(mut current) = iter.next() else {
            return Ok(());
        };
        let mut run: u8 = 1;
        for byte in iter {
            if byte == current && run < u8::MAX {
                run += 1;
            } else {
                out.extend_from_slice(&[run, current]);
                current = byte;
                run = 1;
            }
        }
        out.extend_from_slice(&[run, current]);
        Ok(())
    }

    fn decompress(&self, blob: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        if blob.len() % 2 != 0 {
            return Err(CodecError::decompression_failed(NAME, "odd blob length"));
        }
        for pair in blob.chunks_exact(2) {
            let (run, byte) = (pair[0], pair[1]);
            if run == 0 {
                return Err(CodecError::decompression_failed(NAME, "zero-length run"));
            }
            out.resize(out.len() + usize::from(run), byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(raw: &[u8]) -> Vec<u8> {
        let mut blob = Vec::new();
        RunLength.compress(raw, &mut blob).unwrap();
        let mut out = Vec::new();
        RunLength.decompress(&blob, &mut out).unwrap();
        assert_eq!(out, raw);
        blob
    }

    #[test]
    fn runs_are_collapsed() {
        assert_eq!(roundtrip(b"aaab"), vec![3, b'a', 1, b'b']);
    }

    #[test]
    fn long_runs_are_split() {
        let raw = vec![0u8; 600];
        let blob = roundtrip(&raw);
        assert_eq!(blob, vec![255, 0, 255, 0, 90, 0]);
    }

    #[test]
    fn malformed_blobs_are_rejected() {
        let mut out = Vec::new();
        assert!(RunLength.decompress(&[1, 2, 3], &mut out).is_err());
        assert!(RunLength.decompress(&[0, 2], &mut out).is_err());
    }
}
