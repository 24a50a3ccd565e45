//! The version graph (component G): per-path snapshot/diff/chunked-snapshot
//! chaining and reconstruction, built on `flightrec-storage`'s CAS and
//! `flightrec-diffsync`'s diff/chunk/merkle primitives.

pub mod graph;

pub use flightrec_core::config::ChunkerParams;
pub use graph::{CaptureOutcome, ReconstructTarget, VersionGraph};
