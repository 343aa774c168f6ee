//! Benchmark utilities.

use dbflat_core::{CompFlags, FieldBuf};
use rand::Rng;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate text-like bytes drawn from a small alphabet.
pub fn text_data(size: usize) -> Vec<u8> {
    const ALPHABET: &[u8] = b"etaoin shrdlu";
    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

/// Generate bytes made of long runs.
pub fn run_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(size);
    while out.len() < size {
        let byte: u8 = rng.gen();
        let run = rng.gen_range(8..64).min(size - out.len());
        out.extend(std::iter::repeat(byte).take(run));
    }
    out
}

/// Generate `count` array fields with tags `1..=count` and random payloads.
pub fn record_fields(count: u16, payload_size: usize) -> Vec<FieldBuf> {
    (1..=count)
        .map(|tag| FieldBuf::new(tag, CompFlags::ARRAY, random_data(payload_size)))
        .collect()
}

/// Tags `1..=8`, the full hot range.
pub fn all_hot() -> Vec<u16> {
    (1..=dbflat_core::MAX_HOT_TAG).collect()
}
