//! The ingest journal (component H) and the async compactor that drains it
//! into the version graph (component I).

pub mod compactor;
pub mod journal;

pub use compactor::{spawn, Compactor};
pub use journal::{Journal, JournalStats};
