//! Shared record types persisted under the namespaces defined in `key.rs`.
//!
//! Every type here is `Serialize`/`Deserialize` and encoded with `bincode`
//! before being written to the key-value engine; nothing in this crate talks
//! to the engine directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;

/// The kind of filesystem mutation a journal record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// The path was created.
    Create,
    /// The path's content was overwritten.
    Write,
    /// The path was removed.
    Delete,
}

/// A raw write event, created by the ingest journal and consumed exactly
/// once by the compactor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Nanoseconds since the Unix epoch, as observed by the capture caller.
    pub timestamp: i64,
    /// Path relative to the watched root.
    pub path: String,
    /// What kind of mutation occurred.
    pub op: WriteOp,
    /// File content at the time of capture. Empty for `Delete`.
    pub payload: Vec<u8>,
}

impl JournalRecord {
    /// Encodes this record for storage under its `l:` key.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a record previously written by [`JournalRecord::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// The two supported digest families. The algorithm is fixed for the
/// lifetime of a store; mixing is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256, a common 256-bit cryptographic hash.
    Sha256,
    /// BLAKE3, a tree-friendly hash well suited to incremental/chunked use.
    Blake3,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Blake3
    }
}

/// The two named binary-diff variants from the spec. Only `Bytewise` is
/// implemented; `Unsupported` is returned for `Myers` until it ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffAlgorithm {
    /// Greedy copy/insert delta over matching byte runs (implemented).
    Bytewise,
    /// Classic Myers line/byte diff (not implemented; reserved).
    Myers,
}

impl Default for DiffAlgorithm {
    fn default() -> Self {
        DiffAlgorithm::Bytewise
    }
}

/// Reference descriptor stored under `r:<content-id>`.
///
/// Invariant: `count == referers.len()`. A descriptor is deleted entirely
/// when its last referer is removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefDescriptor {
    /// Number of distinct paths currently referencing this content-id.
    pub count: u32,
    /// The referencing paths themselves.
    pub referers: BTreeSet<String>,
}

impl RefDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// One chunk within a chunk manifest: an absolute byte range plus the CAS
/// digest of its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEntry {
    /// CAS content-id of this chunk's bytes.
    pub hash: String,
    /// Absolute offset of this chunk within the file.
    pub offset: u64,
    /// Length in bytes of this chunk.
    pub length: u64,
}

/// The chunk layout for one version of a chunked file, stored under
/// `k:<path>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub chunks: Vec<ChunkEntry>,
}

impl ChunkManifest {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Total original size covered by this manifest.
    pub fn total_size(&self) -> u64 {
        self.chunks.iter().map(|c| c.length).sum()
    }
}

/// Per-path metadata for one captured version, stored under
/// `m:<path>:<ts>`. See the data model for the invariants this type must
/// satisfy across a path's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Path this version belongs to (kept for self-checking after decode).
    pub path: String,
    /// Monotonic per-path counter, starting at 1.
    pub version_count: u64,
    /// Creation timestamp, nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Whether this version is a full snapshot rather than a diff.
    pub is_snapshot: bool,
    /// Whether this version was stored via the chunked path.
    pub is_chunked: bool,
    /// Digest of the most recent ancestor snapshot; empty when
    /// `is_snapshot` is true.
    pub base_snapshot_cid: String,
    /// Ordered content-ids: the chunk sequence for a chunked snapshot, the
    /// single blob for a plain snapshot, or the diff chain since the base
    /// snapshot for a diff record.
    pub cids: Vec<String>,
    /// Merkle root over `cids`.
    pub merkle_root: String,
    /// Uncompressed size of the captured content.
    pub original_size: u64,
    /// On-disk size actually written for this version's new blobs.
    pub stored_size: u64,
}

impl VersionRecord {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_record_roundtrips() {
        let rec = JournalRecord {
            timestamp: 1234,
            path: "a/b.txt".into(),
            op: WriteOp::Write,
            payload: vec![1, 2, 3],
        };
        let bytes = rec.encode().unwrap();
        let back = JournalRecord::decode(&bytes).unwrap();
        assert_eq!(back.timestamp, rec.timestamp);
        assert_eq!(back.path, rec.path);
        assert_eq!(back.payload, rec.payload);
    }

    #[test]
    fn ref_descriptor_default_is_empty() {
        let d = RefDescriptor::default();
        assert_eq!(d.count, 0);
        assert!(d.referers.is_empty());
    }
}
