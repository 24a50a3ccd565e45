//! Frame-wrapped compression for stored blobs (component B).
//!
//! Compressed blobs are prefixed with a 4-byte magic marker so that legacy
//! or deliberately-uncompressed blobs (no marker) remain readable by
//! [`decompress`]. Content addressing always happens over the uncompressed
//! bytes; the codec only affects what lands on disk.

use flightrec_core::error::{Error, Result};

/// Marks a blob as zstd-compressed by this codec.
pub const MAGIC: &[u8; 4] = b"DKZ1";

/// zstd compression level; chosen for a reasonable speed/ratio balance on
/// the small-to-medium blobs (diffs, chunks, snapshots) this store handles.
const COMPRESSION_LEVEL: i32 = 3;

/// Compresses `data`, returning `MAGIC || zstd(data)`.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let body = zstd::encode_all(data, COMPRESSION_LEVEL).expect("zstd encoding is infallible for in-memory buffers");
    let mut out = Vec::with_capacity(MAGIC.len() + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&body);
    out
}

/// Reverses [`compress`]. Bytes without the magic prefix are returned
/// unchanged (the legacy/fallback path). Bytes with the magic prefix that
/// fail to decode raise `Corrupt`.
pub fn decompress(stored: &[u8]) -> Result<Vec<u8>> {
    if stored.len() < MAGIC.len() || &stored[..MAGIC.len()] != MAGIC {
        return Ok(stored.to_vec());
    }
    zstd::decode_all(&stored[MAGIC.len()..])
        .map_err(|e| Error::Corrupt(format!("zstd frame failed to decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_arbitrary_bytes() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = compress(&data);
        assert!(compressed.starts_with(MAGIC));
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn unwrapped_bytes_pass_through() {
        let data = b"no magic here".to_vec();
        assert_eq!(decompress(&data).unwrap(), data);
    }

    #[test]
    fn corrupt_frame_is_rejected() {
        let mut bad = MAGIC.to_vec();
        bad.extend_from_slice(b"not actually zstd");
        assert!(decompress(&bad).is_err());
    }

    #[test]
    fn empty_input_roundtrips() {
        let compressed = compress(&[]);
        assert_eq!(decompress(&compressed).unwrap(), Vec::<u8>::new());
    }
}
