//! Append-only ingest journal (component H).
//!
//! `append` does exactly one non-sync batch write and nothing else — no
//! hashing, no diffing, no version-graph interaction. That work belongs to
//! the compactor, which is the only other thing that ever touches `l:`.

use flightrec_core::error::{Error, Result};
use flightrec_core::key;
use flightrec_core::types::{JournalRecord, WriteOp};
use flightrec_storage::engine::{Batch, Durability, Engine};

/// Plain-data counters for the journal's current footprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalStats {
    /// Number of records not yet drained by the compactor.
    pub pending: u64,
}

/// Append-only front door to the `l:` namespace.
pub struct Journal {
    engine: Engine,
}

impl Journal {
    pub fn new(engine: Engine) -> Self {
        Journal { engine }
    }

    /// Appends one raw write event. Uses the engine's non-sync durability
    /// hint so producers never pay fsync latency; data loss on crash is
    /// bounded by the engine's own WAL flush interval.
    pub fn append(&self, op: WriteOp, path: &str, payload: &[u8], timestamp_ns: i64) -> Result<()> {
        let record = JournalRecord {
            timestamp: timestamp_ns,
            path: path.to_string(),
            op,
            payload: payload.to_vec(),
        };
        let mut batch = Batch::new();
        batch.put(key::journal_key(timestamp_ns), record.encode()?);
        self.engine
            .apply_batch(batch, Durability::NoSync)
            .map_err(|e| Error::WriteFailed(e.to_string()))
    }

    /// Number of records currently sitting in the journal, unprocessed.
    pub fn stats(&self) -> Result<JournalStats> {
        let mut pending = 0u64;
        for entry in self.engine.scan_prefix(key::journal_scan_prefix()) {
            entry?;
            pending += 1;
        }
        Ok(JournalStats { pending })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_increments_pending_depth() {
        let journal = Journal::new(Engine::open_temporary().unwrap());
        assert_eq!(journal.stats().unwrap().pending, 0);
        journal.append(WriteOp::Write, "a.txt", b"hello", 1).unwrap();
        journal.append(WriteOp::Write, "b.txt", b"world", 2).unwrap();
        assert_eq!(journal.stats().unwrap().pending, 2);
    }

    #[test]
    fn same_timestamp_records_both_survive() {
        let journal = Journal::new(Engine::open_temporary().unwrap());
        journal.append(WriteOp::Write, "a.txt", b"one", 100).unwrap();
        journal.append(WriteOp::Write, "b.txt", b"two", 100).unwrap();
        assert_eq!(journal.stats().unwrap().pending, 2);
    }
}
