//! Storage and versioning core for a filesystem flight recorder.
//!
//! [`Recorder`] is the facade: it owns the key-value engine, wires together
//! the content-addressed store, version graph, ingest journal, and
//! background compactor, and exposes the three external interfaces a
//! surrounding capture/export tool needs — `observe`, `export`, `timeline`.
//! Everything else in the workspace is reachable but this is the crate most
//! callers should depend on.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::info;

pub use flightrec_core::config::{ChunkerParams, RecorderConfig, RecorderConfigBuilder};
pub use flightrec_core::error::{Error, Result};
pub use flightrec_core::types::{DiffAlgorithm, HashAlgorithm, WriteOp};
pub use flightrec_export::{ExportReport, TimelineEntry};
pub use flightrec_storage::cas::CasStats;
pub use flightrec_ingest::JournalStats;
pub use flightrec_versioning::ReconstructTarget;

use flightrec_ingest::{Compactor, Journal};
use flightrec_storage::cas::ContentStore;
use flightrec_storage::engine::Engine;
use flightrec_storage::schema::open_and_migrate;
use flightrec_versioning::VersionGraph;

/// A target for [`Recorder::export`]: either the most recent restorable
/// state, or a point in time relative to when the recorder was opened.
#[derive(Debug, Clone, Copy)]
pub enum ExportTarget {
    Latest,
    After(Duration),
}

/// An open flight recorder: a key-value engine, content store, version
/// graph, ingest journal, and a running compactor thread. Value-with-
/// lifecycle — construct with [`Recorder::open`], release with
/// [`Recorder::close`].
pub struct Recorder {
    config: RecorderConfig,
    engine: Engine,
    cas: Arc<ContentStore>,
    graph: Arc<VersionGraph>,
    journal: Journal,
    compactor: Arc<Compactor>,
    compactor_handle: Option<JoinHandle<()>>,
    start_ns: i64,
}

impl Recorder {
    /// Opens the engine at `config.data_dir`, running any pending schema
    /// migration, and starts the background compactor.
    pub fn open(config: RecorderConfig) -> Result<Self> {
        let engine = Engine::open(&config.data_dir)?;
        let schema_version = open_and_migrate(&engine)?;
        info!(schema_version, data_dir = %config.data_dir.display(), "recorder: opened");

        let cas = Arc::new(ContentStore::new(engine.clone(), config.hash_algorithm));
        let graph = Arc::new(VersionGraph::new(
            engine.clone(),
            cas.clone(),
            config.snapshot_interval,
            config.chunk_threshold,
            config.chunker,
            config.hash_algorithm,
            config.diff_algorithm,
        ));
        let journal = Journal::new(engine.clone());
        let compactor = Arc::new(Compactor::new(engine.clone(), graph.clone(), config.compactor_poll_interval));
        let compactor_handle = Some(flightrec_ingest::spawn(compactor.clone()));

        Ok(Recorder {
            config,
            engine,
            cas,
            graph,
            journal,
            compactor,
            compactor_handle,
            start_ns: now_ns(),
        })
    }

    /// The capture callback (§6.1): records one observed write. `absolute_path`
    /// must fall under `config.watch_root`; anything else is `OutOfScope`.
    pub fn observe(&self, op: WriteOp, absolute_path: &Path, payload: &[u8]) -> Result<()> {
        let relative = flightrec_core::path::relativize(&self.config.watch_root, absolute_path)?;
        self.journal.append(op, &relative, payload, now_ns())
    }

    /// The export command (§6.2): reconstructs every tracked path as of
    /// `target` and writes it under `out_dir`.
    pub fn export(&self, target: ExportTarget, out_dir: &Path) -> Result<ExportReport> {
        let internal_target = match target {
            ExportTarget::Latest => ReconstructTarget::Latest,
            ExportTarget::After(d) => ReconstructTarget::AtTime(self.start_ns + d.as_nanos() as i64),
        };
        flightrec_export::export_to_dir(&self.graph, internal_target, out_dir)
    }

    /// The timeline command (§6.3): every captured version, in chronological
    /// order, read-only from the `m:` namespace.
    pub fn timeline(&self) -> Result<Vec<TimelineEntry>> {
        flightrec_export::timeline(&self.graph)
    }

    /// Current content-store footprint.
    pub fn cas_stats(&self) -> Result<CasStats> {
        self.cas.stats()
    }

    /// Current ingest journal depth.
    pub fn journal_stats(&self) -> Result<JournalStats> {
        self.journal.stats()
    }

    /// Deletes any CAS blob with no live reference. Not called automatically
    /// (scheduling is left to the integrator); safe to call concurrently
    /// with the compactor.
    pub fn garbage_collect(&self) -> Result<u64> {
        self.cas.garbage_collect()
    }

    /// Stops the compactor and forces a final engine flush. Consumes the
    /// recorder; further use requires [`Recorder::open`] again.
    pub fn close(mut self) -> Result<()> {
        self.compactor.cancel_handle().store(true, Ordering::Relaxed);
        if let Some(handle) = self.compactor_handle.take() {
            let _ = handle.join();
        }
        self.engine.flush()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Best-effort: if the caller didn't call `close`, still ask the
        // compactor to stop rather than leaking a spinning thread. We don't
        // join here — blocking in `drop` is the wrong tradeoff.
        self.compactor.cancel_handle().store(true, Ordering::Relaxed);
    }
}

fn now_ns() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_recorder(watch_root: &Path) -> Recorder {
        let data_dir = tempfile::tempdir().unwrap().into_path();
        let config = RecorderConfig::builder(data_dir, watch_root).build().unwrap();
        Recorder::open(config).unwrap()
    }

    #[test]
    fn observe_export_round_trip() {
        let watch = tempfile::tempdir().unwrap();
        let recorder = open_recorder(watch.path());

        let file = watch.path().join("a.txt");
        recorder.observe(WriteOp::Write, &file, b"hello").unwrap();

        // Give the compactor a moment to drain; it polls frequently by
        // default, and the test config uses the builder's default interval.
        std::thread::sleep(Duration::from_millis(300));

        let out = tempfile::tempdir().unwrap();
        let report = recorder.export(ExportTarget::Latest, out.path()).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(std::fs::read(out.path().join("a.txt")).unwrap(), b"hello");

        recorder.close().unwrap();
    }

    #[test]
    fn out_of_root_paths_are_rejected() {
        let watch = tempfile::tempdir().unwrap();
        let recorder = open_recorder(watch.path());
        let outside = Path::new("/definitely/not/under/watch/root.txt");
        let err = recorder.observe(WriteOp::Write, outside, b"x").unwrap_err();
        assert!(matches!(err, Error::OutOfScope(_)));
        recorder.close().unwrap();
    }
}
