//! Per-field compression adapter.
//!
//! A [`CompressorRegistry`] maps the 4-bit compressor id carried in a
//! field's `comp_flags` to a [`Compressor`]. Every call is independent:
//! there is no dictionary or state shared between fields, so any field can
//! be decompressed on its own.
//!
//! | id | compressor |
//! |----|------------|
//! | 0  | raw (identity) |
//! | 1  | run-length |
//! | 2  | canonical Huffman |
//! | 3  | reserved |
//! | 4  | zstd |
//! | 5–15 | free for [`CompressorRegistry::register`] |

mod huffman;
mod rle;
mod zstd_codec;

use crate::error::{CodecError, CodecResult};
use std::fmt;
use std::sync::{Arc, OnceLock};

pub use huffman::Huffman;
pub use rle::RunLength;
pub use zstd_codec::{Zstd, ZSTD_MAX_OUTPUT};

/// Identity compressor id.
pub const COMP_RAW: u8 = 0;
/// Run-length compressor id.
pub const COMP_RLE: u8 = 1;
/// Canonical Huffman compressor id.
pub const COMP_HUFFMAN: u8 = 2;
/// Reserved compressor id, never registered by default.
pub const COMP_RESERVED: u8 = 3;
/// General-purpose adaptive compressor (zstd) id.
pub const COMP_ZSTD: u8 = 4;

/// Number of addressable compressor ids.
pub const MAX_COMPRESSORS: usize = 16;

/// A stateless blob codec.
pub trait Compressor: Send + Sync {
    /// Short human-readable name.
    fn name(&self) -> &'static str;

    /// Append the compressed form of `raw` to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying codec fails.
    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> CodecResult<()>;

    /// Append the decompressed form of `blob` to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if `blob` is not a valid encoding.
    fn decompress(&self, blob: &[u8], out: &mut Vec<u8>) -> CodecResult<()>;
}

/// Identity codec, registered under id 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Compressor for Raw {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        out.extend_from_slice(raw);
        Ok(())
    }

    fn decompress(&self, blob: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        out.extend_from_slice(blob);
        Ok(())
    }
}

/// Table of compressors indexed by id.
#[derive(Clone)]
pub struct CompressorRegistry {
    slots: [Option<Arc<dyn Compressor>>; MAX_COMPRESSORS],
}

impl CompressorRegistry {
    /// A registry holding only the raw codec.
    #[must_use]
    pub fn raw_only() -> Self {
        let mut slots: [Option<Arc<dyn Compressor>>; MAX_COMPRESSORS] =
            std::array::from_fn(|_| None);
        slots[usize::from(COMP_RAW)] = Some(Arc::new(Raw));
        Self { slots }
    }

    /// A registry with every built-in compressor.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::raw_only();
        registry.slots[usize::from(COMP_RLE)] = Some(Arc::new(RunLength));
        registry.slots[usize::from(COMP_HUFFMAN)] = Some(Arc::new(Huffman));
        registry.slots[usize::from(COMP_ZSTD)] = Some(Arc::new(Zstd::default()));
        registry
    }

    /// Shared registry with the built-in compressors.
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<CompressorRegistry> = OnceLock::new();
        BUILTIN.get_or_init(Self::with_builtins)
    }

    /// Register `compressor` under `id`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not fit in four bits or is the raw id.
    pub fn register(&mut self, id: u8, compressor: Arc<dyn Compressor>) -> CodecResult<()> {
        let slot = self.slot_mut(id)?;
        *slot = Some(compressor);
        Ok(())
    }

    /// Remove the compressor registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not fit in four bits or is the raw id.
    pub fn unregister(&mut self, id: u8) -> CodecResult<()> {
        let slot = self.slot_mut(id)?;
        *slot = None;
        Ok(())
    }

    /// The compressor registered under `id`, if any.
    #[must_use]
    pub fn get(&self, id: u8) -> Option<&dyn Compressor> {
        self.slots.get(usize::from(id))?.as_deref()
    }

    /// Whether a compressor is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: u8) -> bool {
        self.get(id).is_some()
    }

    /// Compress `raw` with compressor `id`, appending to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownCompressor`] for unregistered ids, or the
    /// compressor's own failure.
    pub fn compress_into(&self, id: u8, raw: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        self.lookup(id)?.compress(raw, out)
    }

    /// Decompress `blob` with compressor `id`, appending to `out`.
    ///
    /// When `expected_size` is given the decompressed length must match it.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownCompressor`] for unregistered ids,
    /// [`CodecError::SizeMismatch`] on a length mismatch, or the
    /// compressor's own failure.
    pub fn decompress_into(
        &self,
        id: u8,
        blob: &[u8],
        expected_size: Option<usize>,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        let start = out.len();
        self.lookup(id)?.decompress(blob, out)?;
        let actual = out.len() - start;
        match expected_size {
            Some(expected) if expected != actual => {
                out.truncate(start);
                Err(CodecError::SizeMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn lookup(&self, id: u8) -> CodecResult<&dyn Compressor> {
        self.get(id).ok_or(CodecError::UnknownCompressor { id })
    }

    fn slot_mut(&mut self, id: u8) -> CodecResult<&mut Option<Arc<dyn Compressor>>> {
        if id == COMP_RAW {
            return Err(CodecError::ReservedCompressor { id });
        }
        self.slots
            .get_mut(usize::from(id))
            .ok_or(CodecError::UnknownCompressor { id })
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for CompressorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (id, slot) in self.slots.iter().enumerate() {
            if let Some(compressor) = slot {
                map.entry(&id, &compressor.name());
            }
        }
        map.finish()
    }
}

/// Compress `raw` with built-in compressor `codec_id`.
///
/// # Errors
///
/// Returns [`CodecError::UnknownCompressor`] for ids without a built-in codec.
pub fn compress(codec_id: u8, raw: &[u8]) -> CodecResult<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    CompressorRegistry::builtin().compress_into(codec_id, raw, &mut out)?;
    Ok(out)
}

/// Decompress `blob` with built-in compressor `codec_id`.
///
/// # Errors
///
/// Returns [`CodecError::UnknownCompressor`] for ids without a built-in
/// codec, or [`CodecError::SizeMismatch`] if `expected_size` disagrees.
pub fn decompress(codec_id: u8, blob: &[u8], expected_size: Option<usize>) -> CodecResult<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_size.unwrap_or(blob.len()));
    CompressorRegistry::builtin().decompress_into(codec_id, blob, expected_size, &mut out)?;
    Ok(out)
}
