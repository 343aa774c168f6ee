//! zstd, the general-purpose adaptive compressor.

use super::Compressor;
use crate::error::{CodecError, CodecResult};
use std::io::Read;

const NAME: &str = "zstd";

/// Default ceiling on decompressed output, 16 MiB.
pub const ZSTD_MAX_OUTPUT: usize = 16 << 20;

/// zstd compressor, id 4.
///
/// Decompression stops with [`CodecError::OutputTooLarge`] once the output
/// would pass `max_output`, so a small corrupt blob cannot expand without
/// bound.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
    max_output: usize,
}

impl Zstd {
    /// zstd at the given compression level.
    #[must_use]
    pub const fn with_level(level: i32) -> Self {
        Self {
            level,
            max_output: ZSTD_MAX_OUTPUT,
        }
    }

    /// Set the decompressed output ceiling.
    #[must_use]
    pub const fn max_output(mut self, limit: usize) -> Self {
        self.max_output = limit;
        self
    }

    /// Configured compression level.
    #[must_use]
    pub const fn level(&self) -> i32 {
        self.level
    }

    /// Configured output ceiling.
    #[must_use]
    pub const fn output_limit(&self) -> usize {
        self.max_output
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self::with_level(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Compressor for Zstd {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        let blob = zstd::encode_all(raw, self.level)
            .map_err(|e| CodecError::compression_failed(NAME, e.to_string()))?;
        out.extend_from_slice(&blob);
        Ok(())
    }

    fn decompress(&self, blob: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        let failed = |e: std::io::Error| CodecError::decompression_failed(NAME, e.to_string());
        let decoder = zstd::stream::read::Decoder::new(blob).map_err(failed)?;
        let start = out.len();
        // One byte past the ceiling is enough to tell that it was crossed.
        let cap = u64::try_from(self.max_output).unwrap_or(u64::MAX).saturating_add(1);
        if let Err(e) = decoder.take(cap).read_to_end(out) {
            out.truncate(start);
            return Err(failed(e));
        }
        if out.len() - start > self.max_output {
            out.truncate(start);
            return Err(CodecError::OutputTooLarge {
                codec: NAME,
                limit: self.max_output,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repetitive_input_shrinks() {
        let raw = b"Heavy Data ".repeat(64);
        let mut blob = Vec::new();
        Zstd::default().compress(&raw, &mut blob).unwrap();
        assert!(blob.len() < raw.len());

        let mut out = Vec::new();
        Zstd::with_level(19).decompress(&blob, &mut out).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn output_ceiling_is_enforced() {
        let raw = vec![0u8; 64 * 1024];
        let mut blob = Vec::new();
        Zstd::default().compress(&raw, &mut blob).unwrap();
        assert!(blob.len() < 1024);

        let mut out = b"kept".to_vec();
        assert_eq!(
            Zstd::default().max_output(4096).decompress(&blob, &mut out),
            Err(CodecError::OutputTooLarge {
                codec: "zstd",
                limit: 4096
            })
        );
        assert_eq!(out, b"kept");

        let mut out = Vec::new();
        Zstd::default().max_output(raw.len()).decompress(&blob, &mut out).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn garbage_is_rejected() {
        let mut out = Vec::new();
        assert!(Zstd::default().decompress(b"not a frame", &mut out).is_err());
    }
}
