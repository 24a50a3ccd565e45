//! Async compactor (component I): the single background worker that drains
//! the ingest journal into the version graph.
//!
//! Crash safety relies entirely on two properties already provided by the
//! layers below: [`flightrec_storage::cas::ContentStore::put`] is
//! deduplicating, and [`flightrec_versioning::VersionGraph::capture`] is a
//! no-op when the content hash hasn't changed since the last capture. A
//! crash between writing the version record and deleting the journal entry
//! therefore just causes the same record to be reprocessed as a no-op on
//! restart, never a duplicate version.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use flightrec_core::error::Result;
use flightrec_core::key;
use flightrec_core::types::{JournalRecord, WriteOp};
use flightrec_storage::engine::Engine;
use flightrec_versioning::VersionGraph;

/// Drains `l:` into the version graph until cancelled.
pub struct Compactor {
    engine: Engine,
    graph: Arc<VersionGraph>,
    poll_interval: Duration,
    cancel: Arc<AtomicBool>,
}

impl Compactor {
    pub fn new(engine: Engine, graph: Arc<VersionGraph>, poll_interval: Duration) -> Self {
        Compactor {
            engine,
            graph,
            poll_interval,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A shareable flag; setting it stops the compactor at the next
    /// iterator boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs the drain loop until `cancel_handle()` is set. Intended to be
    /// called from a dedicated background thread (see [`spawn`]).
    pub fn run(&self) {
        info!("compactor: starting");
        while !self.cancel.load(Ordering::Relaxed) {
            match self.drain_once() {
                Ok(0) => std::thread::sleep(self.poll_interval),
                Ok(n) => debug!(drained = n, "compactor: drain iteration complete"),
                Err(e) => {
                    warn!(error = %e, "compactor: drain iteration failed, backing off");
                    std::thread::sleep(self.poll_interval);
                }
            }
        }
        info!("compactor: stopped");
    }

    /// Processes every record currently in the journal, oldest first.
    /// Returns the number of records removed.
    fn drain_once(&self) -> Result<u64> {
        let mut processed = 0u64;
        for entry in self.engine.scan_prefix(key::journal_scan_prefix()) {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let (raw_key, value) = entry?;

            match JournalRecord::decode(&value) {
                Ok(record) => {
                    if let Err(e) = self.apply(&record) {
                        warn!(path = %record.path, error = %e, "compactor: skipping unprocessable record");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "compactor: dropping malformed journal record");
                }
            }

            self.engine.remove(&raw_key)?;
            processed += 1;
        }
        Ok(processed)
    }

    fn apply(&self, record: &JournalRecord) -> Result<()> {
        match record.op {
            WriteOp::Create | WriteOp::Write => {
                self.graph.capture(&record.path, record.timestamp, &record.payload)?;
            }
            WriteOp::Delete => {
                // No explicit tombstone type exists in the version record;
                // a delete is recorded as a capture of zero-length content,
                // which reconstructs as an empty file and still stands in
                // the version chain like any other change.
                self.graph.capture(&record.path, record.timestamp, &[])?;
            }
        }
        Ok(())
    }
}

/// Spawns `compactor`'s [`Compactor::run`] loop on a dedicated thread.
pub fn spawn(compactor: Arc<Compactor>) -> JoinHandle<()> {
    std::thread::spawn(move || compactor.run())
}
