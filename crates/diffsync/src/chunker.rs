//! Content-defined rolling chunker (component E).
//!
//! A byte stream is split into variable-length chunks so that identical
//! byte ranges across versions of a file land in identical chunks (and
//! therefore identical CAS digests), which is what makes cross-version
//! deduplication of very large files possible. The chunker never holds more
//! than one in-flight chunk (bounded by `max_size`) in memory at a time.

use flightrec_core::config::ChunkerParams;
use flightrec_core::error::Result;
use flightrec_core::types::HashAlgorithm;
use flightrec_storage::digest::digest;
use std::io::Read;

/// One emitted chunk's position and content-id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub hash: String,
    pub offset: u64,
    pub length: u64,
}

struct RollingHash {
    window: usize,
    base: u128,
    modulus: u64,
    base_pow: u128,
    value: u128,
    buffer: std::collections::VecDeque<u8>,
}

impl RollingHash {
    /// Mersenne prime modulus; large enough for stable hash distribution
    /// over the byte alphabet without risking silent 64-bit overflow in the
    /// arithmetic below (all products are taken in `u128`).
    const MODULUS: u64 = (1u64 << 61) - 1;
    const BASE: u128 = 257;

    fn new(window: usize) -> Self {
        let window = window.max(1);
        let modulus = Self::MODULUS as u128;
        let mut base_pow = 1u128;
        for _ in 0..window.saturating_sub(1) {
            base_pow = (base_pow * Self::BASE) % modulus;
        }
        RollingHash {
            window,
            base: Self::BASE,
            modulus: Self::MODULUS,
            base_pow,
            value: 0,
            buffer: std::collections::VecDeque::with_capacity(window),
        }
    }

    fn push(&mut self, byte: u8) -> u64 {
        let modulus = self.modulus as u128;
        if self.buffer.len() == self.window {
            let oldest = self.buffer.pop_front().unwrap() as u128;
            let contribution = (oldest * self.base_pow) % modulus;
            self.value = (self.value + modulus - contribution) % modulus;
        }
        self.value = (self.value * self.base + byte as u128) % modulus;
        self.buffer.push_back(byte);
        self.value as u64
    }
}

/// Streams `reader` into content-defined chunks, invoking `on_chunk` with
/// each chunk's metadata and bytes as soon as a boundary is found. The
/// callback is responsible for persisting the bytes (typically via
/// `ContentStore::put_chunk`); this function never buffers more than
/// `params.max_size` bytes at once.
pub fn chunk_reader<R: Read>(
    mut reader: R,
    params: ChunkerParams,
    algorithm: HashAlgorithm,
    mut on_chunk: impl FnMut(Chunk, &[u8]) -> Result<()>,
) -> Result<()> {
    let params = params.normalized();
    let mask = params.mask();
    let mut hasher = RollingHash::new(params.window as usize);

    let mut current = Vec::new();
    let mut absolute_offset: u64 = 0;
    let mut read_buf = [0u8; 8192];
    let mut saw_any_byte = false;

    loop {
        let n = reader.read(&mut read_buf)?;
        if n == 0 {
            break;
        }
        for &byte in &read_buf[..n] {
            saw_any_byte = true;
            current.push(byte);
            let h = hasher.push(byte);

            let at_boundary = current.len() as u64 >= params.min_size as u64 && h & mask == 0;
            let at_ceiling = current.len() as u64 >= params.max_size as u64;

            if at_boundary || at_ceiling {
                emit(&mut current, &mut absolute_offset, algorithm, &mut on_chunk)?;
                hasher = RollingHash::new(params.window as usize);
            }
        }
    }

    if !current.is_empty() {
        emit(&mut current, &mut absolute_offset, algorithm, &mut on_chunk)?;
    } else if !saw_any_byte {
        // Empty file: a single zero-length chunk carrying the empty digest.
        let hash = digest(&[], algorithm);
        on_chunk(
            Chunk {
                hash,
                offset: 0,
                length: 0,
            },
            &[],
        )?;
    }

    Ok(())
}

/// Convenience wrapper over an in-memory buffer, for callers that already
/// hold the whole file (small-to-medium chunking, and tests).
pub fn chunk_bytes(data: &[u8], params: ChunkerParams, algorithm: HashAlgorithm) -> Result<Vec<(Chunk, Vec<u8>)>> {
    let mut out = Vec::new();
    chunk_reader(data, params, algorithm, |chunk, bytes| {
        out.push((chunk, bytes.to_vec()));
        Ok(())
    })?;
    Ok(out)
}

fn emit(
    current: &mut Vec<u8>,
    absolute_offset: &mut u64,
    algorithm: HashAlgorithm,
    on_chunk: &mut impl FnMut(Chunk, &[u8]) -> Result<()>,
) -> Result<()> {
    let length = current.len() as u64;
    let hash = digest(current, algorithm);
    on_chunk(
        Chunk {
            hash,
            offset: *absolute_offset,
            length,
        },
        current,
    )?;
    *absolute_offset += length;
    current.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> ChunkerParams {
        ChunkerParams {
            min_size: 32,
            avg_size: 64,
            max_size: 256,
            window: 16,
        }
    }

    #[test]
    fn empty_input_yields_one_zero_length_chunk() {
        let chunks = chunk_bytes(&[], small_params(), HashAlgorithm::Blake3).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].0.length, 0);
        assert_eq!(chunks[0].0.hash, digest(&[], HashAlgorithm::Blake3));
    }

    #[test]
    fn chunker_is_deterministic() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let a = chunk_bytes(&data, small_params(), HashAlgorithm::Blake3).unwrap();
        let b = chunk_bytes(&data, small_params(), HashAlgorithm::Blake3).unwrap();
        let a_meta: Vec<_> = a.iter().map(|(c, _)| c.clone()).collect();
        let b_meta: Vec<_> = b.iter().map(|(c, _)| c.clone()).collect();
        assert_eq!(a_meta, b_meta);
    }

    #[test]
    fn chunk_bytes_cover_input_with_no_gaps() {
        let data: Vec<u8> = (0..10_000u32).map(|i| ((i * 7) % 256) as u8).collect();
        let chunks = chunk_bytes(&data, small_params(), HashAlgorithm::Blake3).unwrap();

        let mut expected_offset = 0u64;
        let mut reassembled = Vec::new();
        for (chunk, bytes) in &chunks {
            assert_eq!(chunk.offset, expected_offset);
            assert_eq!(chunk.length, bytes.len() as u64);
            expected_offset += chunk.length;
            reassembled.extend_from_slice(bytes);
        }
        assert_eq!(reassembled, data);
    }

    #[test]
    fn forced_boundary_respects_max_size() {
        let data = vec![0u8; 10_000]; // constant bytes never hit the hash mask naturally at this window
        let params = small_params();
        let chunks = chunk_bytes(&data, params, HashAlgorithm::Blake3).unwrap();
        for (chunk, _) in &chunks[..chunks.len() - 1] {
            assert!(chunk.length <= params.max_size as u64);
            assert!(chunk.length >= params.min_size as u64);
        }
    }

    #[test]
    fn shared_prefix_produces_shared_leading_chunks() {
        let params = small_params();
        let mut a = vec![1u8; 500];
        let mut b = a.clone();
        a.extend_from_slice(&[2u8; 500]);
        b.extend_from_slice(&[3u8; 500]);

        let chunks_a = chunk_bytes(&a, params, HashAlgorithm::Blake3).unwrap();
        let chunks_b = chunk_bytes(&b, params, HashAlgorithm::Blake3).unwrap();

        assert_eq!(chunks_a[0].0.hash, chunks_b[0].0.hash);
    }
}
