//! Tunables for the recorder, validated eagerly so misconfiguration is a
//! startup error (the "Misconfigured" taxonomy entry) rather than a
//! surprise deep inside the compactor.

use crate::error::{Error, Result};
use crate::types::{DiffAlgorithm, HashAlgorithm};
use std::path::PathBuf;

/// Rolling-chunker parameters (component E).
///
/// `min_size <= avg_size <= max_size`, each strictly positive, and
/// `window > 0`. Values that violate this are snapped upward rather than
/// rejected, matching the spec's normalisation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerParams {
    pub min_size: u32,
    pub avg_size: u32,
    pub max_size: u32,
    pub window: u32,
}

impl Default for ChunkerParams {
    fn default() -> Self {
        ChunkerParams {
            min_size: 2 * 1024,
            avg_size: 8 * 1024,
            max_size: 64 * 1024,
            window: 64,
        }
    }
}

impl ChunkerParams {
    /// Normalises an arbitrary set of values to satisfy
    /// `min_size <= avg_size <= max_size` and `window > 0`, snapping
    /// upward rather than failing.
    pub fn normalized(mut self) -> Self {
        if self.min_size == 0 {
            self.min_size = 1;
        }
        if self.avg_size < self.min_size {
            self.avg_size = self.min_size;
        }
        if self.max_size < self.avg_size {
            self.max_size = self.avg_size;
        }
        if self.window == 0 {
            self.window = 1;
        }
        self
    }

    /// The largest `2^k - 1` not exceeding `avg_size`; the rolling-hash
    /// boundary mask.
    pub fn mask(&self) -> u64 {
        let mut bits = 0u32;
        while (1u64 << (bits + 1)) - 1 <= self.avg_size as u64 {
            bits += 1;
        }
        (1u64 << bits.max(1)) - 1
    }
}

/// Top-level configuration for a recorder instance.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory the key-value engine persists to.
    pub data_dir: PathBuf,
    /// Root directory being watched; `observe` paths are canonicalised
    /// relative to this.
    pub watch_root: PathBuf,
    /// Every `snapshot_interval`-th version of a non-chunked path is
    /// forced to be a full snapshot rather than a diff.
    pub snapshot_interval: u64,
    /// Files at or above this size use the chunked path instead of the
    /// snapshot/diff path.
    pub chunk_threshold: u64,
    /// Rolling-chunker tuning.
    pub chunker: ChunkerParams,
    /// Digest algorithm used for content-ids.
    pub hash_algorithm: HashAlgorithm,
    /// Binary-diff variant used for non-chunked descendants.
    pub diff_algorithm: DiffAlgorithm,
    /// How long the compactor sleeps after draining an empty journal.
    pub compactor_poll_interval: std::time::Duration,
}

impl RecorderConfig {
    /// Starts a builder seeded with defaults for everything except the two
    /// mandatory paths.
    pub fn builder(data_dir: impl Into<PathBuf>, watch_root: impl Into<PathBuf>) -> RecorderConfigBuilder {
        RecorderConfigBuilder {
            data_dir: data_dir.into(),
            watch_root: watch_root.into(),
            snapshot_interval: 10,
            chunk_threshold: 8 * 1024 * 1024,
            chunker: ChunkerParams::default(),
            hash_algorithm: HashAlgorithm::default(),
            diff_algorithm: DiffAlgorithm::default(),
            compactor_poll_interval: std::time::Duration::from_millis(200),
        }
    }
}

/// Builder for [`RecorderConfig`]; validates on [`build`](Self::build).
pub struct RecorderConfigBuilder {
    data_dir: PathBuf,
    watch_root: PathBuf,
    snapshot_interval: u64,
    chunk_threshold: u64,
    chunker: ChunkerParams,
    hash_algorithm: HashAlgorithm,
    diff_algorithm: DiffAlgorithm,
    compactor_poll_interval: std::time::Duration,
}

impl RecorderConfigBuilder {
    pub fn snapshot_interval(mut self, n: u64) -> Self {
        self.snapshot_interval = n;
        self
    }

    pub fn chunk_threshold(mut self, bytes: u64) -> Self {
        self.chunk_threshold = bytes;
        self
    }

    pub fn chunker(mut self, params: ChunkerParams) -> Self {
        self.chunker = params.normalized();
        self
    }

    pub fn hash_algorithm(mut self, algo: HashAlgorithm) -> Self {
        self.hash_algorithm = algo;
        self
    }

    pub fn diff_algorithm(mut self, algo: DiffAlgorithm) -> Self {
        self.diff_algorithm = algo;
        self
    }

    pub fn compactor_poll_interval(mut self, d: std::time::Duration) -> Self {
        self.compactor_poll_interval = d;
        self
    }

    /// Validates the accumulated settings, returning `InvalidConfig` for
    /// anything nonsensical.
    pub fn build(self) -> Result<RecorderConfig> {
        if self.snapshot_interval == 0 {
            return Err(Error::InvalidConfig(
                "snapshot_interval must be >= 1".into(),
            ));
        }
        if self.chunk_threshold == 0 {
            return Err(Error::InvalidConfig("chunk_threshold must be >= 1".into()));
        }
        if matches!(self.diff_algorithm, DiffAlgorithm::Myers) {
            return Err(Error::Unsupported(
                "Myers diff algorithm is not implemented".into(),
            ));
        }
        Ok(RecorderConfig {
            data_dir: self.data_dir,
            watch_root: self.watch_root,
            snapshot_interval: self.snapshot_interval,
            chunk_threshold: self.chunk_threshold,
            chunker: self.chunker,
            hash_algorithm: self.hash_algorithm,
            diff_algorithm: self.diff_algorithm,
            compactor_poll_interval: self.compactor_poll_interval,
        })
    }
}
