//! Read-only timeline (component J's sibling in §6's external interfaces):
//! a human-readable, time-ordered log of captured versions built purely
//! from an `m:` prefix scan, never touching the journal or CAS.

use flightrec_core::error::Result;
use flightrec_core::types::WriteOp;
use flightrec_versioning::VersionGraph;

/// One entry in the human-readable event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Nanoseconds since the earliest captured version across all paths.
    pub ts_relative: i64,
    /// Best-effort classification of the event. The version record itself
    /// doesn't persist the original write kind, so this is inferred:
    /// a path's first version is `Create`, a zero-length capture is
    /// `Delete`, everything else is `Write`.
    pub op: WriteOp,
    pub path: String,
    pub size: u64,
}

/// Every captured version across every path, in chronological order.
pub fn timeline(graph: &VersionGraph) -> Result<Vec<TimelineEntry>> {
    let mut all = Vec::new();
    for path in graph.list_paths()? {
        for record in graph.list_versions(&path)? {
            let op = if record.version_count == 1 {
                WriteOp::Create
            } else if record.original_size == 0 {
                WriteOp::Delete
            } else {
                WriteOp::Write
            };
            all.push((record.timestamp, TimelineEntry {
                ts_relative: record.timestamp,
                op,
                path: path.clone(),
                size: record.original_size,
            }));
        }
    }

    all.sort_by_key(|(ts, _)| *ts);
    let epoch = all.first().map(|(ts, _)| *ts).unwrap_or(0);

    Ok(all
        .into_iter()
        .map(|(ts, mut entry)| {
            entry.ts_relative = ts - epoch;
            entry
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightrec_core::types::{DiffAlgorithm, HashAlgorithm};
    use flightrec_storage::cas::ContentStore;
    use flightrec_storage::engine::Engine;
    use std::sync::Arc;

    fn graph() -> VersionGraph {
        let engine = Engine::open_temporary().unwrap();
        let cas = Arc::new(ContentStore::new(engine.clone(), HashAlgorithm::Blake3));
        VersionGraph::new(engine, cas, 10, 8 * 1024 * 1024, Default::default(), HashAlgorithm::Blake3, DiffAlgorithm::Bytewise)
    }

    #[test]
    fn timeline_is_chronological_and_relative_to_the_first_event() {
        let g = graph();
        g.capture("a.txt", 1_000, b"hello").unwrap();
        g.capture("b.txt", 2_000, b"world").unwrap();

        let entries = timeline(&g).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ts_relative, 0);
        assert_eq!(entries[0].path, "a.txt");
        assert_eq!(entries[0].op, WriteOp::Create);
        assert_eq!(entries[1].ts_relative, 1_000);
        assert_eq!(entries[1].path, "b.txt");
    }

    #[test]
    fn zero_length_capture_is_classified_as_delete() {
        let g = graph();
        g.capture("a.txt", 1, b"hello").unwrap();
        g.capture("a.txt", 2, b"").unwrap();

        let entries = timeline(&g).unwrap();
        assert_eq!(entries.last().unwrap().op, WriteOp::Delete);
    }
}
