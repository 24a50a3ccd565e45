//! Shared types, error taxonomy, key encoding, and configuration for the
//! flight recorder's storage and versioning core.
//!
//! Every other workspace crate depends on this one and nothing else in the
//! workspace; it has no dependency on the key-value engine binding itself
//! ([`flightrec_storage::Engine`]), only on the `sled::Error` type it wraps.

pub mod config;
pub mod error;
pub mod key;
pub mod path;
pub mod types;

pub use config::{ChunkerParams, RecorderConfig, RecorderConfigBuilder};
pub use error::{Error, Result};
pub use types::{ChunkEntry, ChunkManifest, DiffAlgorithm, HashAlgorithm, JournalRecord, RefDescriptor, VersionRecord, WriteOp};
