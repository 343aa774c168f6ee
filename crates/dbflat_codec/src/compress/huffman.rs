//! Canonical Huffman coding over bytes.
//!
//! Blob layout:
//!
//! ```text
//! varint(raw_len) | code_len[256] | bitstream (MSB first, zero padded)
//! ```
//!
//! An empty input is just `varint(0)`. Code lengths are capped at
//! [`MAX_CODE_LEN`] by flattening the frequency table until the tree fits.

use super::Compressor;
use crate::error::{CodecError, CodecResult};
use crate::varint::{read_varuint, write_varuint};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const NAME: &str = "huffman";

/// Longest code the encoder emits and the decoder accepts.
pub const MAX_CODE_LEN: usize = 24;

const SYMBOLS: usize = 256;

/// Canonical Huffman compressor, id 2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Huffman;

impl Compressor for Huffman {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        write_varuint(out, raw.len() as u64);
        if raw.is_empty() {
            return Ok(());
        }

        let mut freq = [0u64; SYMBOLS];
        for &byte in raw {
            freq[usize::from(byte)] += 1;
        }
        let lengths = limited_code_lengths(&freq);
        let codes = canonical_codes(&lengths);

        out.extend(lengths.iter().map(|&len| len as u8));
        let mut writer = BitWriter::new(out);
        for &byte in raw {
            let sym = usize::from(byte);
            writer.write(codes[sym], lengths[sym]);
        }
        writer.finish();
        Ok(())
    }

    fn decompress(&self, blob: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
        let (raw_len, used) = read_varuint(blob);
        if used == 0 {
            return Err(CodecError::decompression_failed(NAME, "truncated length"));
        }
        if raw_len == 0 {
            return Ok(());
        }
        let rest = &blob[used..];
        if rest.len() < SYMBOLS {
            return Err(CodecError::decompression_failed(NAME, "truncated code table"));
        }
        let (table, stream) = rest.split_at(SYMBOLS);

        let mut lengths = [0usize; SYMBOLS];
        for (slot, &len) in lengths.iter_mut().zip(table) {
            *slot = usize::from(len);
        }
        let decoder = CanonicalDecoder::new(&lengths)?;

        // Each symbol costs at least one bit.
        let raw_len = usize::try_from(raw_len)
            .ok()
            .filter(|&n| n <= stream.len().saturating_mul(8))
            .ok_or_else(|| CodecError::decompression_failed(NAME, "length exceeds bitstream"))?;

        out.reserve(raw_len);
        let mut reader = BitReader::new(stream);
        for _ in 0..raw_len {
            out.push(decoder.decode(&mut reader)?);
        }
        Ok(())
    }
}

/// Code lengths for every symbol, none longer than [`MAX_CODE_LEN`].
fn limited_code_lengths(freq: &[u64; SYMBOLS]) -> [usize; SYMBOLS] {
    let mut scaled = *freq;
    loop {
        let lengths = code_lengths(&scaled);
        if lengths.iter().all(|&len| len <= MAX_CODE_LEN) {
            return lengths;
        }
        for f in scaled.iter_mut().filter(|f| **f > 0) {
            *f = (*f).div_ceil(2);
        }
    }
}

/// Unbounded Huffman code lengths.
fn code_lengths(freq: &[u64; SYMBOLS]) -> [usize; SYMBOLS] {
    let mut lengths = [0usize; SYMBOLS];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
    // Leaves occupy node ids 0..SYMBOLS; internal nodes follow.
    let mut parent: Vec<usize> = vec![usize::MAX; SYMBOLS];

    for (sym, &f) in freq.iter().enumerate() {
        if f > 0 {
            heap.push(Reverse((f, sym)));
        }
    }

    if heap.len() == 1 {
        if let Some(Reverse((_, sym))) = heap.pop() {
            lengths[sym] = 1;
        }
        return lengths;
    }

    while heap.len() > 1 {
        let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        let node = parent.len();
        parent.push(usize::MAX);
        parent[a] = node;
        parent[b] = node;
        heap.push(Reverse((fa + fb, node)));
    }

    for (sym, len) in lengths.iter_mut().enumerate() {
        if freq[sym] == 0 {
            continue;
        }
        let mut depth = 0;
        let mut node = sym;
        while parent[node] != usize::MAX {
            node = parent[node];
            depth += 1;
        }
        *len = depth;
    }
    lengths
}

/// Assign canonical codes: shorter codes first, ties broken by symbol.
fn canonical_codes(lengths: &[usize; SYMBOLS]) -> [u32; SYMBOLS] {
    let mut codes = [0u32; SYMBOLS];
    let mut code: u32 = 0;
    for len in 1..=MAX_CODE_LEN {
        for sym in 0..SYMBOLS {
            if lengths[sym] == len {
                codes[sym] = code;
                code += 1;
            }
        }
        code <<= 1;
    }
    codes
}

struct CanonicalDecoder {
    counts: [u32; MAX_CODE_LEN + 1],
    symbols: Vec<u8>,
}

impl CanonicalDecoder {
    fn new(lengths: &[usize; SYMBOLS]) -> CodecResult<Self> {
        let mut counts = [0u32; MAX_CODE_LEN + 1];
        for &len in lengths {
            if len > MAX_CODE_LEN {
                return Err(CodecError::decompression_failed(NAME, "code length too long"));
            }
            counts[len] += 1;
        }
        counts[0] = 0;

        // Kraft inequality: the lengths must describe a prefix code.
        let mut space: u64 = 0;
        for (len, &count) in counts.iter().enumerate().skip(1) {
            space += u64::from(count) << (MAX_CODE_LEN - len);
        }
        if space == 0 || space > 1 << MAX_CODE_LEN {
            return Err(CodecError::decompression_failed(NAME, "invalid code table"));
        }

        let mut symbols = Vec::with_capacity(SYMBOLS);
        for len in 1..=MAX_CODE_LEN {
            for (sym, &l) in lengths.iter().enumerate() {
                if l == len {
                    symbols.push(sym as u8);
                }
            }
        }
        Ok(Self { counts, symbols })
    }

    fn decode(&self, reader: &mut BitReader<'_>) -> CodecResult<u8> {
        let mut code: u32 = 0;
        let mut first: u32 = 0;
        let mut index: usize = 0;
        for len in 1..=MAX_CODE_LEN {
            code |= reader
                .read_bit()
                .ok_or_else(|| CodecError::decompression_failed(NAME, "bitstream exhausted"))?;
            let count = self.counts[len];
            if code < first + count {
                return Ok(self.symbols[index + (code - first) as usize]);
            }
            index += count as usize;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(CodecError::decompression_failed(NAME, "invalid code"))
    }
}

struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    acc: u64,
    bits: usize,
}

impl<'a> BitWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, acc: 0, bits: 0 }
    }

    fn write(&mut self, code: u32, len: usize) {
        self.acc = (self.acc << len) | u64::from(code);
        self.bits += len;
        while self.bits >= 8 {
            self.bits -= 8;
            self.out.push((self.acc >> self.bits) as u8);
        }
        self.acc &= (1u64 << self.bits) - 1;
    }

    fn finish(self) {
        if self.bits > 0 {
            self.out.push((self.acc << (8 - self.bits)) as u8);
        }
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_bit(&mut self) -> Option<u32> {
        let byte = *self.data.get(self.pos / 8)?;
        let bit = (byte >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        Some(u32::from(bit))
    }
}
