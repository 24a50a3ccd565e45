//! Reconstruction / export (component J): rebuild every tracked path's
//! content at a target time and write it under an output directory.

use std::fs;

use tracing::{info, warn};

use flightrec_core::error::Result;
use flightrec_core::path::rejoin;
use flightrec_versioning::{ReconstructTarget, VersionGraph};

/// Counts surfaced by one [`export`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub restored: u64,
    pub skipped: u64,
}

/// Reconstructs every path known to `graph` as of `target` and writes it
/// under `out_dir`, creating parent directories as needed.
///
/// A single path's failure (corruption, missing content) is logged and
/// counted in `skipped`; every other path is still attempted. Matches the
/// failure policy of reconstruction itself: never silently produce wrong
/// bytes, never let one bad path take the rest down.
pub fn export(graph: &VersionGraph, target: ReconstructTarget, out_dir: &std::path::Path) -> Result<ExportReport> {
    let paths = graph.list_paths()?;
    let mut report = ExportReport::default();

    for path in paths {
        match graph.reconstruct(&path, target) {
            Ok(bytes) => {
                let dest = rejoin(out_dir, &path);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dest, &bytes)?;
                report.restored += 1;
            }
            Err(e) => {
                warn!(path, error = %e, "export: skipping path after reconstruction failure");
                report.skipped += 1;
            }
        }
    }

    info!(restored = report.restored, skipped = report.skipped, "export: complete");
    Ok(report)
}
