//! Content-digest computation shared by the CAS, chunker, and version graph.
//!
//! The digest is always taken over uncompressed bytes; it is the textual
//! content-id used as the CAS key suffix and as Merkle leaf input.

use flightrec_core::types::HashAlgorithm;
use sha2::{Digest, Sha256};

/// Computes the hex content-id of `data` under `algorithm`.
pub fn digest(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            hex::encode(hasher.finalize())
        }
        HashAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
    }
}
