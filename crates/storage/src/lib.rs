//! Key-value engine binding, compression codec, content-addressed store,
//! and schema migration.
//!
//! This crate owns the only dependency on the external key-value engine
//! (component A); everything above it talks to [`Engine`] and
//! [`ContentStore`], never to `sled` directly.

pub mod cas;
pub mod codec;
pub mod digest;
pub mod engine;
pub mod schema;

pub use cas::{CasStats, ContentStore};
pub use engine::{Batch, Durability, Engine};
pub use schema::{open_and_migrate, CURRENT_SCHEMA_VERSION};
