//! Error taxonomy for the flight recorder
//!
//! This is the single `Error` type shared by every workspace crate. The
//! variant set is deliberately small and matches the stable error codes
//! surfaced to callers (see the spec's External Interfaces section):
//! `NotFound`, `Corrupt`, `Unsupported`, `InvalidConfig`, `WriteFailed`,
//! `IntegrityFailed`, `OutOfScope`. A handful of lower-level variants wrap
//! the dependencies each crate needs (the key-value engine, I/O,
//! serialization) so `?` works end to end without per-crate wrapper types.

use thiserror::Error;

/// Result type alias used throughout the recorder.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the flight recorder core.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested digest, version, or chunk does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored bytes failed to decode (bad compression frame, malformed
    /// record, Merkle mismatch).
    #[error("corrupt: {0}")]
    Corrupt(String),

    /// The requested diff algorithm or hash family is not compiled in.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A configuration value is out of range or otherwise invalid. Detected
    /// at startup; the process refuses to start.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A journal append or CAS write failed to complete.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Merkle root or reference-count verification failed.
    #[error("integrity check failed: {0}")]
    IntegrityFailed(String),

    /// A path fell outside the watched root.
    #[error("path out of scope: {0}")]
    OutOfScope(String),

    /// Underlying key-value engine error.
    #[error("engine error: {0}")]
    Engine(#[from] sled::Error),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding/decoding error for internal record formats.
    #[error("serialization error: {0}")]
    Serialization(#[from] Box<bincode::ErrorKind>),
}

impl Error {
    /// True for errors a retrying caller might reasonably resolve by trying
    /// again (transient engine hiccups). Corruption, configuration, and
    /// scope errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Engine(_))
    }
}
