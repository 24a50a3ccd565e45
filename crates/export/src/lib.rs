//! Reconstruction/export (component J) and the read-only timeline.

pub mod export;
pub mod timeline;

pub use export::{export as export_to_dir, ExportReport};
pub use timeline::{timeline, TimelineEntry};
