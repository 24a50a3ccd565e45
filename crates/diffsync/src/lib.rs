//! Binary diff, content-defined chunking, and Merkle integrity verification.
//!
//! Sits above `flightrec-storage` (it reuses `digest` for chunk and leaf
//! hashing) and below `flightrec-versioning`, which decides when to call
//! into each of these.

pub mod chunker;
pub mod diff;
pub mod merkle;

pub use chunker::{chunk_bytes, chunk_reader, Chunk};
pub use diff::{apply_patch, compute_diff};
pub use merkle::{verify_integrity, MerkleTree};
